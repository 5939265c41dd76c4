//! Adapter wiring: credential store and tenant directory behind the auth ports.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use parish_auth::{
    CredentialStore, DirectoryWriter, IdentityAdministration, ImpersonationManager,
    SessionResolver, StoreError, TenantDirectory,
};
use parish_infra::{InMemoryDirectory, JwtCredentialStore, PostgresDirectory};

use crate::config::ApiConfig;
use crate::transport::CookiePolicy;

/// Everything the handlers need, built once per process.
#[derive(Clone)]
pub struct AppServices {
    pub resolver: SessionResolver,
    pub impersonation: ImpersonationManager,
    pub administration: IdentityAdministration,
    pub cookies: CookiePolicy,
}

impl AppServices {
    pub fn new<D>(config: &ApiConfig, credentials: Arc<dyn CredentialStore>, directory: Arc<D>) -> Self
    where
        D: TenantDirectory + DirectoryWriter + 'static,
    {
        let reader: Arc<dyn TenantDirectory> = directory.clone();
        let writer: Arc<dyn DirectoryWriter> = directory;

        Self {
            resolver: SessionResolver::new(credentials, reader.clone(), &config.auth),
            impersonation: ImpersonationManager::new(reader.clone(), &config.auth),
            administration: IdentityAdministration::new(reader, writer, &config.auth),
            cookies: CookiePolicy {
                secure: config.secure_cookies,
            },
        }
    }
}

/// Postgres directory when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    match &config.database_url {
        Some(url) => build_persistent_services(config, url).await,
        None => {
            tracing::warn!("DATABASE_URL not set; using an empty in-memory directory");
            Ok(build_in_memory_services(
                config,
                Arc::new(InMemoryDirectory::new()),
            ))
        }
    }
}

pub fn build_in_memory_services(config: &ApiConfig, directory: Arc<InMemoryDirectory>) -> AppServices {
    AppServices::new(config, jwt_store(config), directory)
}

async fn build_persistent_services(config: &ApiConfig, url: &str) -> Result<AppServices, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.auth.lookup_timeout)
        .connect(url)
        .await
        .map_err(|e| StoreError::unavailable(format!("failed to connect to Postgres: {e}")))?;

    let directory = PostgresDirectory::new(pool);
    directory.ensure_schema().await?;
    tracing::info!("using Postgres tenant directory");

    Ok(AppServices::new(config, jwt_store(config), Arc::new(directory)))
}

fn jwt_store(config: &ApiConfig) -> Arc<dyn CredentialStore> {
    Arc::new(JwtCredentialStore::new(config.jwt_secret.as_bytes()))
}
