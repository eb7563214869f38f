use skyward_reconcile::Reconciler;
use skyward_reconcile::testing::FakeControlPlane;
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fake control plane and a reconciler with default policies driving it
pub fn setup() -> (Arc<FakeControlPlane>, Reconciler) {
    init_tracing();
    let fake = Arc::new(FakeControlPlane::new());
    let reconciler = Reconciler::new(fake.clone());
    (fake, reconciler)
}

/// Mutating calls only, without the polling in between
#[allow(dead_code)]
pub fn mutations(fake: &FakeControlPlane) -> Vec<String> {
    fake.calls()
        .iter()
        .map(|c| c.name().to_string())
        .filter(|name| !name.starts_with("Get"))
        .collect()
}
