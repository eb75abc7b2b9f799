use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{
    CertflowError, Result, ShareLock,
    model::{AccessModel, CertificateModel, SettingsModel, WorkflowLogModel, WorkflowModel, WorkflowRunModel},
};

use super::{DbCollection, DbCollectionIden, StoreIden, map_db_err};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Result<Arc<dyn DbCollection<Item = DATA>>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().map_err(map_db_err)?;
        collections
            .get(&DATA::iden())
            .and_then(|collection| collection.downcast_ref::<DynDbSetRef<DATA>>())
            .map(|v| v.0.clone())
            .ok_or_else(|| CertflowError::Store(format!("fail to get collection: {}", DATA::iden().as_ref())))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        trace!("store::register({})", DATA::iden().as_ref());
        if let Ok(mut collections) = self.collections.write() {
            collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
        }
    }

    pub fn accesses(&self) -> Result<Arc<dyn DbCollection<Item = AccessModel>>> {
        self.collection()
    }

    pub fn certificates(&self) -> Result<Arc<dyn DbCollection<Item = CertificateModel>>> {
        self.collection()
    }

    pub fn settings(&self) -> Result<Arc<dyn DbCollection<Item = SettingsModel>>> {
        self.collection()
    }

    pub fn workflows(&self) -> Result<Arc<dyn DbCollection<Item = WorkflowModel>>> {
        self.collection()
    }

    pub fn runs(&self) -> Result<Arc<dyn DbCollection<Item = WorkflowRunModel>>> {
        self.collection()
    }

    pub fn logs(&self) -> Result<Arc<dyn DbCollection<Item = WorkflowLogModel>>> {
        self.collection()
    }

    /// Creates or replaces a record; returns `true` when it was created.
    pub fn save<DATA>(
        &self,
        id: &str,
        data: &DATA,
    ) -> Result<bool>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        trace!("store::save({}, {})", DATA::iden().as_ref(), id);
        let collection = self.collection::<DATA>()?;
        if collection.exists(id)? {
            collection.update(data)?;
            Ok(false)
        } else {
            collection.create(data)
        }
    }
}
