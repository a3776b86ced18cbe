//! Files a local deck under `<parent>/<zone>/<market>/` based on its first slide.

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use crate::constants::PPTX_MIME_TYPE;
use crate::deck::{self, SlideSelector};
use crate::drive::{DriveApi, DriveError};
use crate::fields::{FieldExtractor, ZoneMarketExtractor, MARKET_KEY, ZONE_KEY};
use crate::links::sanitize_filename;
use crate::uploader::{UploadAction, Uploader};

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("no market name found on the first slide of {0}")]
    MissingMarket(String),

    #[error(transparent)]
    Drive(#[from] DriveError),
}

#[derive(Debug, Clone)]
pub struct OrganizeReport {
    pub zone: Option<String>,
    pub market: String,
    /// `None` when the zone folder could not be used and the market folder went under the parent.
    pub zone_folder_id: Option<String>,
    pub market_folder_id: String,
    pub upload: UploadAction,
}

/// Reads zone and market from the deck at `local`, ensures the folders exist
/// under `parent_id` and uploads the deck into the market folder.
///
/// Nothing is created when no market can be found. A zone folder that cannot be
/// found or created is logged and the market folder is placed under `parent_id`.
pub async fn organize_deck(
    drive: &dyn DriveApi,
    local: &Path,
    parent_id: &str,
) -> Result<OrganizeReport, OrganizeError> {
    let file_name = local
        .file_name()
        .map(|n| sanitize_filename(&n.to_string_lossy()))
        .unwrap_or_else(|| "deck.pptx".to_string());

    let text = deck::slide_text(local, SlideSelector::First);
    let fields = ZoneMarketExtractor.extract(&text);
    let zone = fields.value(ZONE_KEY).map(str::to_string);
    let market = fields
        .value(MARKET_KEY)
        .map(str::to_string)
        .ok_or_else(|| OrganizeError::MissingMarket(file_name.clone()))?;
    info!(zone = ?zone, market = %market, "organizing deck");

    let uploader = Uploader::new(drive);

    let zone_folder_id = match &zone {
        Some(zone) => match uploader.find_or_create_folder(zone, parent_id).await {
            Ok(id) => Some(id),
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(e) => {
                error!(zone = %zone, error = %e, "zone folder unavailable, using parent");
                None
            }
        },
        None => None,
    };

    let market_parent = zone_folder_id.as_deref().unwrap_or(parent_id);
    let market_folder_id = uploader.find_or_create_folder(&market, market_parent).await?;
    let upload = uploader.upload_or_replace(local, &file_name, PPTX_MIME_TYPE, &market_folder_id).await?;

    Ok(OrganizeReport { zone, market, zone_folder_id, market_folder_id, upload })
}
