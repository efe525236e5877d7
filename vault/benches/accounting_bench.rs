//! Criterion benches for the hot accounting paths: delta recording inside
//! an envelope, and the full arm/deposit/reconcile settle cycle.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use flashvault::{Address, Currency, Vault};

fn setup() -> (Vault, Address, Address, Currency, Currency) {
    let owner = Address::derive("owner");
    let app = Address::derive("app");
    let caller = Address::derive("caller");
    let x = Currency::token(Address::derive("token-x"));
    let y = Currency::token(Address::derive("token-y"));

    let mut vault = Vault::new(owner);
    vault.register_app(owner, app).expect("register");
    vault.deposit(x, u128::MAX / 2).expect("seed x");
    vault.deposit(y, u128::MAX / 2).expect("seed y");
    (vault, app, caller, x, y)
}

fn bench_record_delta(c: &mut Criterion) {
    let (mut vault, app, caller, x, y) = setup();

    c.bench_function("record_delta_100_pairs", |b| {
        b.iter(|| {
            vault
                .unlock(caller, |v| {
                    for _ in 0..100 {
                        v.record_delta(app, caller, x, y, black_box(-10), black_box(-10))?;
                        v.record_delta(app, caller, x, y, black_box(10), black_box(10))?;
                    }
                    Ok(())
                })
                .expect("balanced envelope closes")
        })
    });
}

fn bench_settle_cycle(c: &mut Criterion) {
    let (mut vault, _app, caller, x, _y) = setup();

    c.bench_function("flash_settle_cycle", |b| {
        b.iter(|| {
            vault
                .unlock(caller, |v| {
                    v.withdraw(x, caller, black_box(1_000))?;
                    v.arm(x);
                    v.deposit(x, 1_000)?;
                    v.reconcile(0)?;
                    Ok(())
                })
                .expect("repaid cycle closes")
        })
    });
}

criterion_group!(benches, bench_record_delta, bench_settle_cycle);
criterion_main!(benches);
