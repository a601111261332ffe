use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{core::object::HasStatus, Api, Client, Resource};

pub mod operations;

pub trait FromStatus<S> {
    fn from_status(status: S) -> Self;
}

impl<T: Default + HasStatus<Status = S>, S> FromStatus<S> for T {
    fn from_status(status: S) -> Self {
        let mut object = Self::default();

        *object.status_mut() = Some(status);

        object
    }
}

pub trait GetApi {
    fn namespaced_api<T>(&self, namespace: &str) -> Api<T>
    where
        T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>;

    fn global_api<T>(&self) -> Api<T>
    where
        T: Resource<DynamicType = ()>;

    fn cluster_api<T>(&self) -> Api<T>
    where
        T: Resource<Scope = ClusterResourceScope, DynamicType = ()>;
}

impl GetApi for Client {
    fn namespaced_api<T>(&self, namespace: &str) -> Api<T>
    where
        T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.clone(), namespace)
    }

    fn global_api<T>(&self) -> Api<T>
    where
        T: Resource<DynamicType = ()>,
    {
        Api::all(self.clone())
    }

    fn cluster_api<T>(&self) -> Api<T>
    where
        T: Resource<Scope = ClusterResourceScope, DynamicType = ()>,
    {
        Api::all(self.clone())
    }
}
