//! Module declaration and lifecycle

use crate::config::Config;
use crate::contract::BusinessDataApi;
use crate::domain::Service;
use crate::infra::storage::repositories::{
    SeaOrmDynamicDataRepository, SeaOrmEntityRepository, SeaOrmRelationshipRepository,
    SeaOrmTransactionRepository, SeaOrmWorkflowRepository,
};
use anyhow::Result;
use parking_lot::RwLock;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// HERA core module
pub struct HeraCoreModule {
    config: RwLock<Config>,
    service: RwLock<Option<Arc<Service>>>,
}

impl Default for HeraCoreModule {
    fn default() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            service: RwLock::new(None),
        }
    }
}

impl HeraCoreModule {
    /// Bring the schema up to date
    pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
        use crate::infra::storage::migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        Migrator::up(db, None).await?;
        tracing::info!("HERA core migrations completed");
        Ok(())
    }

    /// Wire repositories and the domain service over a connection
    pub fn init(&self, config: Config, db: Arc<DatabaseConnection>) -> Result<()> {
        // Build repositories
        let entity_repo = Arc::new(SeaOrmEntityRepository::new(db.clone()));
        let dynamic_repo = Arc::new(SeaOrmDynamicDataRepository::new(db.clone()));
        let relationship_repo = Arc::new(SeaOrmRelationshipRepository::new(db.clone()));
        let transaction_repo = Arc::new(SeaOrmTransactionRepository::new(db.clone()));
        let workflow_repo = Arc::new(SeaOrmWorkflowRepository::new(db));

        // Build domain service
        let service = Arc::new(Service::new(
            config.clone(),
            entity_repo,
            dynamic_repo,
            relationship_repo,
            transaction_repo,
            workflow_repo,
        )?);

        *self.config.write() = config;
        *self.service.write() = Some(service);

        tracing::info!("HERA core initialized");
        Ok(())
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Domain service; fails before `init`
    pub fn service(&self) -> Result<Arc<Service>> {
        self.service
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }

    /// Native client over the domain service
    pub fn client(&self) -> Result<Arc<dyn BusinessDataApi>> {
        let service = self.service()?;
        Ok(Arc::new(crate::api::native::NativeClient::new(service)))
    }
}
