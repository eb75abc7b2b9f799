pub mod text;
pub mod time;

/// Record id for repository documents.
pub fn longid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Node id for workflow graph nodes.
pub fn shortid() -> String {
    nanoid::nanoid!()
}
