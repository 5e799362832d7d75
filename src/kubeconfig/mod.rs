mod merge;
mod store;
mod types;

pub use merge::{merge, KUBESAIL_PREFIX};
pub use store::ConfigStore;
pub use types::{
    Cluster, Context, KubeConfig, Named, NamedCluster, NamedContext, NamedUser, User,
};
