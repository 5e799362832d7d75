// src/kubeconfig/merge.rs
use serde_yaml::Mapping;

use super::{Cluster, Context, KubeConfig, Named, NamedCluster, NamedContext, NamedUser, User};
use crate::payload::Credentials;

pub const KUBESAIL_PREFIX: &str = "kubesail-";

/// Name shared by the cluster, user and context created for `username`.
///
/// The username is used verbatim.
pub fn entity_name(username: &str) -> String {
    format!("{}{}", KUBESAIL_PREFIX, username)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Name of the cluster, user and context that were written.
    pub context: String,
    /// True when an entry with that name already existed in any of the lists.
    pub replaced: bool,
    /// True when `current-context` was pointed at the new context.
    pub activated: bool,
}

/// Folds freshly issued credentials into `config`.
///
/// Entries named after the user are overwritten in place, anything else is left
/// exactly where it was. `current-context` is only set when nothing is selected yet.
pub fn merge(mut config: KubeConfig, credentials: &Credentials) -> (KubeConfig, MergeOutcome) {
    let name = entity_name(&credentials.username);

    let cluster = NamedCluster {
        name: name.clone(),
        cluster: Cluster {
            certificate_authority_data: Some(credentials.cert.clone()),
            server: Some(credentials.cluster_address.clone()),
            extra: Mapping::new(),
        },
        extra: Mapping::new(),
    };
    let user = NamedUser {
        name: name.clone(),
        user: User {
            client_key_data: Some(credentials.cert.clone()),
            token: Some(credentials.token.clone()),
            extra: Mapping::new(),
        },
        extra: Mapping::new(),
    };
    let context = NamedContext {
        name: name.clone(),
        context: Context {
            cluster: Some(name.clone()),
            namespace: Some(credentials.namespace.clone()),
            user: Some(name.clone()),
            extra: Mapping::new(),
        },
        extra: Mapping::new(),
    };

    let mut replaced = upsert_by_name(&mut config.clusters, cluster);
    replaced |= upsert_by_name(&mut config.users, user);
    replaced |= upsert_by_name(&mut config.contexts, context);

    let activated = match config.current_context.as_deref() {
        None | Some("") => {
            config.current_context = Some(name.clone());
            true
        }
        Some(_) => false,
    };

    (
        config,
        MergeOutcome {
            context: name,
            replaced,
            activated,
        },
    )
}

/// Overwrites the first entry sharing `entry`'s name, or appends it.
/// Returns whether an existing entry was replaced.
pub fn upsert_by_name<T: Named>(entries: &mut Vec<T>, entry: T) -> bool {
    match entries.iter_mut().find(|e| e.name() == entry.name()) {
        Some(existing) => {
            *existing = entry;
            true
        }
        None => {
            entries.push(entry);
            false
        }
    }
}
