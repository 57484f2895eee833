use std::path::Path;

use leadgen_pipeline::{campaign_leads, render_leads, CampaignStore, ExportFormat, Store, StoreError};
use uuid::Uuid;

/// Exports a campaign's unique leads to `output`, or stdout when `None`.
/// Returns the number of leads written.
///
/// # Errors
///
/// Returns an error for an unknown campaign, a store failure, or if the
/// output file cannot be written.
pub(crate) async fn export(
    store: &dyn Store,
    campaign_id: Uuid,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<usize> {
    let campaign = match store.get_campaign(campaign_id).await {
        Ok(campaign) => campaign,
        Err(StoreError::NotFound) => anyhow::bail!("campaign {campaign_id} not found"),
        Err(e) => return Err(e.into()),
    };
    let leads = campaign_leads(store, campaign_id).await?;
    let body = render_leads(format, &leads, &campaign.name)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, body.as_bytes()).await?;
            tracing::info!(campaign_id = %campaign_id, leads = leads.len(), path = %path.display(), "leads exported");
        }
        None => println!("{body}"),
    }
    Ok(leads.len())
}
