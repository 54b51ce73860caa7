use async_trait::async_trait;

use crate::models::cmdb::{App, AppQuota, Environment, InstanceSpec, Organization, User, Zone};
use crate::utils::error::Error;

/// Read/write access to the CMDB. Implementations report transport failures
/// as `Error::CmdbError` and leave retrying to the caller.
#[async_trait]
pub trait Cmdb: Send + Sync {
    async fn fetch_all_apps(&self) -> Result<Vec<App>, Error>;

    async fn fetch_apps_by_user_name(&self, user_name: &str) -> Result<Vec<App>, Error>;

    async fn fetch_instance_specs(&self) -> Result<Vec<InstanceSpec>, Error>;

    async fn fetch_app_quotas_by_app_and_env(
        &self,
        app_id: &str,
        env: &str,
    ) -> Result<Vec<AppQuota>, Error>;

    async fn fetch_environments(&self) -> Result<Vec<Environment>, Error>;

    async fn fetch_organizations(&self) -> Result<Vec<Organization>, Error>;

    /// `None` when the CMDB has no app with this id.
    async fn fetch_app_by_app_id(&self, app_id: &str) -> Result<Option<App>, Error>;

    async fn search_users_by_user_name(&self, user_name: &str) -> Result<Vec<User>, Error>;

    /// `developers` and `testers` are comma separated user names.
    async fn update_app_member(
        &self,
        app_id: &str,
        developers: &str,
        testers: &str,
    ) -> Result<bool, Error>;

    async fn fetch_zones_by_env(&self, env: &str) -> Result<Vec<Zone>, Error>;

    async fn fetch_all_zones(&self) -> Result<Vec<Zone>, Error>;
}
