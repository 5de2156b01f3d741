use anyhow::{bail, Context, Result};
use reframe_core::AttachmentField;
use reframe_service::HostStore;
use tracing::info;

/// Run all preflight checks before touching any record.
pub async fn run_all(store: &dyn HostStore, source_field: &str, target_field: &str) -> Result<()> {
    check_store_health(store).await?;
    let fields = store
        .list_attachment_fields()
        .await
        .context("failed to list attachment fields")?;
    check_field(&fields, source_field, "source")?;
    check_field(&fields, target_field, "target")?;
    info!("all preflight checks passed");
    Ok(())
}

async fn check_store_health(store: &dyn HostStore) -> Result<()> {
    store
        .health_check()
        .await
        .with_context(|| format!("{} host store is not reachable", store.name()))?;
    info!("store: {} reachable", store.name());
    Ok(())
}

fn check_field(fields: &[AttachmentField], field_id: &str, role: &str) -> Result<()> {
    match fields.iter().find(|f| f.field_id == field_id) {
        Some(field) => {
            info!("{role} field: {} ({})", field.field_id, field.display_name);
            Ok(())
        }
        None => bail!("{role} field {field_id:?} is not an attachment field of this store"),
    }
}
