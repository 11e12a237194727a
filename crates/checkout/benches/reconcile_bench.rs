use std::sync::Arc;

use backend::InMemoryCommerceBackend;
use checkout::{CheckoutFlow, CheckoutSettings, RecordingEventSink, plan_line_changes};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{AssetEntity, AssetId, BillingProfile, Buyer, Decimal, DesiredLine, OrderLine, Service, ServiceId};
use session_store::InMemoryKeyValueStore;

fn existing_lines(n: usize) -> Vec<OrderLine> {
    (0..n)
        .map(|i| OrderLine {
            asset_id: AssetId::new(format!("asset-{i}")),
            quantity: 1,
            unit_price: Decimal::from(10 + i as i64),
            total: Decimal::from(10 + i as i64),
            description: None,
            legal_vat_percent: Decimal::from(21),
        })
        .collect()
}

// Shifted by half: the first half is deleted, the overlap is updated, the tail is added.
fn desired_lines(n: usize) -> Vec<DesiredLine> {
    (n / 2..n + n / 2)
        .map(|i| DesiredLine {
            asset_id: AssetId::new(format!("asset-{i}")),
            quantity: 2,
            unit_price: Decimal::from(10 + i as i64),
            title: format!("Asset {i}"),
            description: format!("Asset {i}"),
            legal_vat_percent: Decimal::from(21),
        })
        .collect()
}

fn bench_plan_line_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/plan_line_changes");
    for size in [10, 100, 500] {
        let existing = existing_lines(size);
        let desired = desired_lines(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| plan_line_changes(&existing, &desired));
        });
    }
    group.finish();
}

fn bench_full_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("reconcile/full_checkout_in_memory", |b| {
        b.iter(|| {
            rt.block_on(async {
                let flow = CheckoutFlow::new(
                    Arc::new(InMemoryCommerceBackend::new()),
                    InMemoryKeyValueStore::new(),
                    RecordingEventSink::new(),
                    CheckoutSettings::new("EUR", Buyer::new("user-1")),
                );
                flow.select_service(Service {
                    id: "rec-1".to_string(),
                    service_id: ServiceId::new("svc-1"),
                    title: "Audit".to_string(),
                    price: Decimal::from(100),
                    organization_id: Some("org-1".into()),
                    legal_vat_percent: Decimal::from(21),
                });
                flow.set_assets(
                    (0..20)
                        .map(|i| AssetEntity::new(format!("asset-{i}"), "Asset", Decimal::from(5), 1))
                        .collect(),
                );
                flow.set_billing_profile(BillingProfile::default());
                flow.run_checkout("card").await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_plan_line_changes, bench_full_checkout);
criterion_main!(benches);
