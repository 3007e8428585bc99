use crate::interface::backend::BackendMetadata;

pub fn list_backends() -> Vec<&'static BackendMetadata> {
    inventory::iter::<BackendMetadata>.into_iter().collect()
}

pub fn find_backend(id: &str) -> Option<&'static BackendMetadata> {
    inventory::iter::<BackendMetadata>
        .into_iter()
        .find(|backend| backend.id.eq_ignore_ascii_case(id))
}

/// The configured backend, or the first registered one.
pub fn resolve_backend(id: Option<&str>) -> Option<&'static BackendMetadata> {
    match id {
        Some(id) => find_backend(id),
        None => list_backends().into_iter().next(),
    }
}
