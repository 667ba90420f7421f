//! # NodeScanner Steps
//!
//! A `NodeScanner` is cluster-scoped and owns everything it creates. Its
//! namespace and cluster RBAC are still deleted explicitly, in reverse
//! creation order, before the cleanup marker is released.

use super::{apply, delete, ManagedKind};
use crate::config::OperatorConfig;
use crate::controller::action::Action;
use crate::controller::error::Error;
use crate::controller::namespace::EnsureNamespace;
use crate::controller::step::Step;
use crate::controller::store::{ManagedObject, ObjectKey, Owner};
use crate::crd::NodeScanner;
use crate::template::{self, Detail, Params};

impl ManagedKind for NodeScanner {
    fn apply_steps(&self, config: &OperatorConfig) -> Result<Vec<Step>, Error> {
        let owner = Owner::of(self);
        let params = Params::for_scanner(self, config);

        Ok(vec![
            Step::EnsureNamespace(EnsureNamespace::new(ManagedObject::from_typed(
                &template::namespace(&params, Detail::Full),
            )?)),
            apply(&owner, &template::service_account(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::cluster_role(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::cluster_role_binding(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::config_map(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::daemon_set(&params, Detail::Full), Action::Stop)?,
        ])
    }

    fn cleanup_steps(&self, config: &OperatorConfig) -> Result<Vec<Step>, Error> {
        let params = Params::for_scanner(self, config);
        Ok(vec![
            delete(&template::cluster_role_binding(&params, Detail::MetadataOnly), Action::Stop)?,
            delete(&template::cluster_role(&params, Detail::MetadataOnly), Action::Stop)?,
            delete(&template::namespace(&params, Detail::MetadataOnly), Action::Stop)?,
        ])
    }

    fn workload_key(&self, config: &OperatorConfig) -> ObjectKey {
        let params = Params::for_scanner(self, config);
        ObjectKey::namespaced(params.namespace, params.name)
    }
}
