use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::{
    CertflowError, Result, ShareLock,
    store::{DbCollection, PageData, StoreIden, db::mem::DbDocument, map_db_err, query::Query},
};

/// In-memory collection keeping records in insertion order.
#[derive(Debug)]
pub struct Collect<T> {
    name: StoreIden,
    items: ShareLock<Vec<T>>,
}

impl<T> Collect<T> {
    pub fn new(name: StoreIden) -> Self {
        Self {
            name,
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let items = self.items.read().map_err(map_db_err)?;
        Ok(items.iter().any(|item| item.id() == id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        trace!("{}::find({})", self.name.as_ref(), id);
        let items = self.items.read().map_err(map_db_err)?;
        items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
            .ok_or_else(|| CertflowError::Store(format!("{} '{}' not found", self.name.as_ref(), id)))
    }

    fn query(
        &self,
        q: &Query,
    ) -> Result<PageData<Self::Item>> {
        trace!("{}::query({:?})", self.name.as_ref(), q);
        let items = self.items.read().map_err(map_db_err)?;

        let mut matched = Vec::new();
        for item in items.iter() {
            let doc = item.doc()?;
            if q.is_match(&doc) {
                matched.push((doc, item));
            }
        }
        // stable, ties keep insertion order
        matched.sort_by(|a, b| q.compare(&a.0, &b.0));

        let count = matched.len();
        let rows = matched.into_iter().map(|(_, item)| item.clone());
        let (rows, page_num, page_count): (Vec<T>, usize, usize) = if q.limit() == 0 {
            (rows.collect(), 1, usize::from(count > 0))
        } else {
            (rows.skip(q.offset()).take(q.limit()).collect(), (q.offset() / q.limit()).saturating_add(1), count.div_ceil(q.limit()))
        };

        Ok(PageData {
            count,
            page_num,
            page_count,
            page_size: q.limit(),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::create({})", self.name.as_ref(), data.id());
        let mut items = self.items.write().map_err(map_db_err)?;
        if items.iter().any(|item| item.id() == data.id()) {
            return Err(CertflowError::Store(format!("{} '{}' already exists", self.name.as_ref(), data.id())));
        }
        items.push(data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::update({})", self.name.as_ref(), data.id());
        let mut items = self.items.write().map_err(map_db_err)?;
        match items.iter_mut().find(|item| item.id() == data.id()) {
            Some(item) => {
                *item = data.clone();
                Ok(true)
            }
            None => Err(CertflowError::Store(format!("{} '{}' not found", self.name.as_ref(), data.id()))),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.name.as_ref(), id);
        let mut items = self.items.write().map_err(map_db_err)?;
        let len = items.len();
        items.retain(|item| item.id() != id);
        Ok(items.len() != len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{WorkflowModel, WorkflowRunModel, WorkflowRunStatus},
        store::query::Expr,
    };

    fn workflow(
        id: &str,
        name: &str,
        created: &str,
    ) -> WorkflowModel {
        WorkflowModel {
            id: id.to_string(),
            name: name.to_string(),
            created: created.to_string(),
            ..Default::default()
        }
    }

    fn sample() -> Collect<WorkflowModel> {
        let c = Collect::new(StoreIden::Workflow);
        c.create(&workflow("w1", "renew a.com", "2024-01-01")).unwrap();
        c.create(&workflow("w2", "renew b.com", "2024-01-03")).unwrap();
        c.create(&workflow("w3", "upload c.com", "2024-01-02")).unwrap();
        c
    }

    #[test]
    fn test_collect_crud() {
        let c = sample();
        assert!(c.exists("w1").unwrap());
        assert_eq!(c.find("w2").unwrap().name, "renew b.com");
        assert!(c.create(&workflow("w1", "dup", "")).is_err());

        let mut w = c.find("w1").unwrap();
        w.enabled = true;
        assert!(c.update(&w).unwrap());
        assert!(c.find("w1").unwrap().enabled);
        assert!(c.update(&workflow("nope", "", "")).is_err());

        assert!(c.delete("w1").unwrap());
        assert!(!c.delete("w1").unwrap());
        assert!(c.find("w1").is_err());
    }

    #[test]
    fn test_collect_query_filter_sort_page() {
        let c = sample();
        let page = c.query(&Query::new().filter(Expr::like("name", "RENEW")).sort("-created")).unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.rows.iter().map(|w| w.id.as_str()).collect::<Vec<_>>(), vec!["w2", "w1"]);
        assert_eq!(page.page_count, 1);

        let page = c.query(&Query::new().sort("created").page(2, 2)).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.page_num, 2);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].id, "w2");

        let page = c.query(&Query::new().page(9, 2)).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.count, 3);

        let page = c.query(&Query::new().page(usize::MAX, 1)).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.page_num, usize::MAX);
    }

    #[test]
    fn test_collect_query_nested_enum_field() {
        let c = Collect::new(StoreIden::WorkflowRun);
        for (id, status) in [("r1", WorkflowRunStatus::Running), ("r2", WorkflowRunStatus::Succeeded)] {
            c.create(&WorkflowRunModel {
                id: id.to_string(),
                workflow_ref: "w1".to_string(),
                status,
                ..Default::default()
            })
            .unwrap();
        }
        let page = c.query(&Query::new().filter(Expr::eq("workflowRef", "w1")).filter(Expr::eq("status", "running"))).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].id, "r1");
    }
}
