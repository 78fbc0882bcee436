//! Microsoft Purview backend: labels, endorsement and the `AnomaloDQ` business metadata.

use async_trait::async_trait;
use dqsync_annotation::{
    merge_annotation, render_profile_image, render_status, MergeKind, StatusFormat,
};
use dqsync_core::RetryPolicy;
use dqsync_monitor::Warehouse;
use dqsync_tags::CatalogTag;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapter::{AssetSync, AssetUpdate, CatalogAdapter};
use crate::error::{AssetStage, CatalogError};
use crate::http::{normalize_root_url, CatalogHttp};
use crate::registry::{require_setting, CatalogKind, CatalogSyncOptions};

const DEFAULT_LOGIN_BASE: &str = "https://login.microsoftonline.com";
const TOKEN_RESOURCE: &str = "https://purview.azure.net";
const BUSINESS_METADATA_NAME: &str = "AnomaloDQ";
const ENDORSEMENT_CLASSIFICATION: &str = "MICROSOFT.POWERBI.ENDORSEMENT";
const BROWSE_API_VERSION: &str = "2023-02-01-preview";
const PROFILE_IMAGE_ALT: &str = "Table column data visualization";
const APPLICABLE_ENTITY_TYPES: &str = "[\"databricks_catalog\",\"databricks_schema\",\"databricks_metastore\",\"databricks_table\",\"databricks_table_column\",\"databricks_view\",\"databricks_view_column\"]";

#[derive(Debug, Clone, Default)]
pub struct PurviewSettings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub root_url: Option<String>,
    pub login_base: Option<String>,
}

/// Catalog entry returned by the browse API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PurviewAsset {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
struct PurviewSession {
    root_url: String,
    access_token: String,
    assets: Vec<PurviewAsset>,
}

pub struct PurviewAdapter {
    settings: PurviewSettings,
    options: CatalogSyncOptions,
    http: CatalogHttp,
    session: Option<PurviewSession>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct BrowseResponse {
    #[serde(default)]
    value: Vec<PurviewAsset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedefErrorResponse {
    #[serde(default)]
    error_message: Option<String>,
}

impl PurviewAdapter {
    pub fn new(
        settings: PurviewSettings,
        options: CatalogSyncOptions,
        retry: RetryPolicy,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            settings,
            options,
            http: CatalogHttp::new(retry)?,
            session: None,
        })
    }

    fn session(&self) -> Result<&PurviewSession, CatalogError> {
        self.session
            .as_ref()
            .ok_or_else(|| CatalogError::configuration("purview adapter used before configure()"))
    }

    async fn request_token(&self) -> Result<String, CatalogError> {
        let tenant_id = require_setting(&self.settings.tenant_id, "ENTRA_TENANT_ID")?;
        let client_id = require_setting(&self.settings.client_id, "ENTRA_CLIENT_ID")?;
        let client_secret = require_setting(&self.settings.client_secret, "ENTRA_CLIENT_SECRET")?;
        let login_base = self
            .settings
            .login_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or(DEFAULT_LOGIN_BASE)
            .trim_end_matches('/');
        let url = format!("{login_base}/{tenant_id}/oauth2/token");
        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("resource", TOKEN_RESOURCE),
        ];
        let token_error = |detail: String| {
            CatalogError::configuration(format!(
                "error getting purview access token from entra ({detail}); check your entra configuration and credentials"
            ))
        };
        let reply = self
            .http
            .send(AssetStage::Apply, "entra token exchange", |client| {
                client.post(&url).form(&form)
            })
            .await
            .map_err(|error| token_error(error.to_string()))?;
        if !reply.is_success() {
            return Err(token_error(format!("status {}", reply.status)));
        }
        let token: TokenResponse = serde_json::from_str(&reply.body)
            .map_err(|error| token_error(format!("invalid token response: {error}")))?;
        Ok(token.access_token)
    }

    /// Creates the business metadata typedef; an existing definition is success
    /// unless `force_update_typedefs` asks for it to be re-applied.
    async fn register_typedefs(&self, root_url: &str, token: &str) -> Result<(), CatalogError> {
        let stage = AssetStage::EnsureSchema;
        let url = format!("{root_url}/catalog/api/atlas/v2/types/typedefs");
        let body = business_metadata_typedef();
        let reply = self
            .http
            .send(stage, "register purview typedefs", |client| {
                client.post(&url).bearer_auth(token).json(&body)
            })
            .await?;
        if reply.is_success() {
            tracing::info!("registered purview business metadata typedef");
            return Ok(());
        }
        let already_exists = serde_json::from_str::<TypedefErrorResponse>(&reply.body)
            .ok()
            .and_then(|response| response.error_message)
            .is_some_and(|message| message.contains("already exists"));
        if !already_exists {
            return Err(reply.into_error(stage, "register purview typedefs"));
        }
        if self.options.force_update_typedefs {
            self.http
                .send_ok(stage, "update purview typedefs", |client| {
                    client.put(&url).bearer_auth(token).json(&body)
                })
                .await?;
            tracing::info!("force-updated purview business metadata typedef");
        } else {
            tracing::debug!("purview business metadata typedef already exists");
        }
        Ok(())
    }

    async fn browse_assets(&self, root_url: &str, token: &str) -> Result<Vec<PurviewAsset>, CatalogError> {
        let operation = "browse purview assets";
        let url = format!("{root_url}/catalog/api/browse");
        let response: BrowseResponse = self
            .http
            .send_ok(AssetStage::ResolveAsset, operation, |client| {
                client
                    .post(&url)
                    .bearer_auth(token)
                    .query(&[("api-version", BROWSE_API_VERSION)])
                    .json(&json!({"entityType": "databricks_table"}))
            })
            .await?
            .decode(AssetStage::ResolveAsset, operation)?;
        Ok(response.value)
    }

    async fn sync_labels(
        &self,
        session: &PurviewSession,
        uid: &str,
        asset: &AssetSync<'_>,
    ) -> Result<(), CatalogError> {
        let url = format!(
            "{}/catalog/api/atlas/v2/entity/guid/{uid}/labels",
            session.root_url
        );
        let mut apply = asset.delta.apply_names();
        if apply.is_empty() {
            apply.push(CatalogTag::Monitored.as_str());
        }
        self.http
            .send_ok(AssetStage::ApplyTags, "set purview labels", |client| {
                client
                    .put(&url)
                    .bearer_auth(&session.access_token)
                    .json(&apply)
            })
            .await?;

        let remove = asset.delta.remove_names();
        if !remove.is_empty() {
            self.http
                .send_ok(AssetStage::RemoveTags, "remove purview labels", |client| {
                    client
                        .delete(&url)
                        .bearer_auth(&session.access_token)
                        .json(&remove)
                })
                .await?;
        }
        Ok(())
    }

    async fn sync_endorsement(
        &self,
        session: &PurviewSession,
        uid: &str,
        table_passed: bool,
    ) -> Result<(), CatalogError> {
        let stage = AssetStage::Endorsement;
        if table_passed {
            let url = format!(
                "{}/catalog/api/atlas/v2/entity/bulk/classification",
                session.root_url
            );
            let body = json!({
                "classification": {
                    "typeName": ENDORSEMENT_CLASSIFICATION,
                    "attributes": {"endorsement": "Certified", "certifiedBy": "Anomalo"}
                },
                "entityGuids": [uid]
            });
            self.http
                .send_ok(stage, "certify purview asset", |client| {
                    client
                        .post(&url)
                        .bearer_auth(&session.access_token)
                        .json(&body)
                })
                .await?;
            return Ok(());
        }

        let url = format!(
            "{}/catalog/api/atlas/v2/entity/guid/{uid}/classification/{ENDORSEMENT_CLASSIFICATION}",
            session.root_url
        );
        let reply = self
            .http
            .send(stage, "remove purview certification", |client| {
                client.delete(&url).bearer_auth(&session.access_token)
            })
            .await?;
        if reply.is_success() || reply.status == 404 {
            Ok(())
        } else {
            Err(reply.into_error(stage, "remove purview certification"))
        }
    }

    async fn write_business_metadata(
        &self,
        session: &PurviewSession,
        uid: &str,
        asset: &AssetSync<'_>,
    ) -> Result<(), CatalogError> {
        let url = format!(
            "{}/catalog/api/atlas/v2/entity/guid/{uid}/businessmetadata",
            session.root_url
        );
        let profile = asset.summary.profile();
        let image = |image_url: Option<&String>| {
            image_url.map(|image_url| render_profile_image(image_url, PROFILE_IMAGE_ALT))
        };
        let body = json!({
            BUSINESS_METADATA_NAME: {
                "AnomaloChecks": render_status(asset.summary, StatusFormat::RichTable),
                "AnomaloColumns": image(profile.and_then(|p| p.columns_image_url.as_ref())),
                "AnomaloProfile": image(profile.and_then(|p| p.profile_image_url.as_ref())),
            }
        });
        self.http
            .send_ok(
                AssetStage::WriteStructuredFields,
                "write purview business metadata",
                |client| {
                    client
                        .post(&url)
                        .bearer_auth(&session.access_token)
                        .json(&body)
                },
            )
            .await?;
        Ok(())
    }

    async fn sync_user_description(
        &self,
        session: &PurviewSession,
        uid: &str,
        asset: &AssetSync<'_>,
    ) -> Result<(), CatalogError> {
        let url = format!("{}/catalog/api/atlas/v2/entity/guid/{uid}", session.root_url);
        let entity: Value = self
            .http
            .send_ok(AssetStage::FetchAnnotation, "get purview entity", |client| {
                client.get(&url).bearer_auth(&session.access_token)
            })
            .await?
            .decode(AssetStage::FetchAnnotation, "get purview entity")?;
        let existing = entity
            .pointer("/entity/attributes/userDescription")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let format = StatusFormat::Html;
        let merged = merge_annotation(
            existing,
            &render_status(asset.summary, format),
            format.markers(),
            self.options.description_mode,
        );
        if merged.kind == MergeKind::DiscardedMalformed {
            tracing::warn!(
                asset = uid,
                "replacing status block with a damaged separator in user description"
            );
        }
        if merged.text == existing {
            return Ok(());
        }
        self.http
            .send_ok(
                AssetStage::WriteAnnotation,
                "update purview user description",
                |client| {
                    client
                        .put(&url)
                        .bearer_auth(&session.access_token)
                        .query(&[("name", "userDescription")])
                        .json(&merged.text)
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for PurviewAdapter {
    fn kind(&self) -> CatalogKind {
        CatalogKind::Purview
    }

    async fn configure(&mut self) -> Result<(), CatalogError> {
        tracing::info!("initializing purview integration");
        let raw_root = require_setting(&self.settings.root_url, "PURVIEW_ROOT_URL")?;
        let root_url = normalize_root_url(&raw_root).ok_or_else(|| {
            CatalogError::configuration(format!("PURVIEW_ROOT_URL `{raw_root}` is not a valid url"))
        })?;
        let access_token = self.request_token().await?;
        self.register_typedefs(&root_url, &access_token).await?;
        let assets = self.browse_assets(&root_url, &access_token).await?;
        tracing::info!(assets = assets.len(), "loaded purview asset list");
        self.session = Some(PurviewSession {
            root_url,
            access_token,
            assets,
        });
        Ok(())
    }

    async fn update_catalog_asset(
        &self,
        warehouse: &Warehouse,
        asset: &AssetSync<'_>,
    ) -> Result<AssetUpdate, CatalogError> {
        let session = self.session()?;
        let table = asset.summary.table();
        let Some(uid) = find_asset_id(&session.assets, table.table_name()) else {
            return Ok(AssetUpdate::skipped(format!(
                "no purview asset named `{}`",
                table.table_name()
            )));
        };

        if self.options.update_labels {
            self.sync_labels(session, uid, asset).await?;
        }
        if self.options.update_endorsement {
            self.sync_endorsement(session, uid, asset.summary.table_passed())
                .await?;
        }
        if self.options.update_aspect {
            self.write_business_metadata(session, uid, asset).await?;
        }
        if self.options.update_description {
            self.sync_user_description(session, uid, asset).await?;
        }

        tracing::info!(
            warehouse = %warehouse.name,
            table = %table.full_name,
            asset = uid,
            "updated purview asset"
        );
        Ok(AssetUpdate::updated(uid))
    }
}

fn find_asset_id<'a>(assets: &'a [PurviewAsset], table_name: &str) -> Option<&'a str> {
    assets
        .iter()
        .find(|asset| asset.name == table_name)
        .map(|asset| asset.id.as_str())
}

fn richtext_attribute(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "typeName": "richtext",
        "isOptional": true,
        "cardinality": "SINGLE",
        "valuesMinCount": 0,
        "valuesMaxCount": 1,
        "isUnique": false,
        "isIndexable": true,
        "includeInNotification": false,
        "description": description,
        "options": {
            "applicableEntityTypes": APPLICABLE_ENTITY_TYPES,
            "isDisabled": "false"
        }
    })
}

fn business_metadata_typedef() -> Value {
    json!({
        "businessMetadataDefs": [{
            "category": "BUSINESS_METADATA",
            "createdBy": "Anomalo",
            "version": 1,
            "name": BUSINESS_METADATA_NAME,
            "description": "Latest Anomalo data quality results",
            "typeVersion": "1.1",
            "attributeDefs": [
                richtext_attribute("AnomaloChecks", "Summary of data quality check results"),
                richtext_attribute("AnomaloColumns", "Visualization of column contents"),
                richtext_attribute("AnomaloProfile", "Data profile of columns"),
            ]
        }]
    })
}
