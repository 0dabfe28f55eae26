use std::sync::Arc;

use super::medium::MediumEnum;

/// The media on either side of a surface boundary. `None` stands for
/// vacuum.
#[derive(Clone, Debug, Default)]
pub struct MediumInterface {
    pub inside: Option<Arc<MediumEnum>>,
    pub outside: Option<Arc<MediumEnum>>,
}

impl MediumInterface {
    pub fn new(inside: Option<Arc<MediumEnum>>, outside: Option<Arc<MediumEnum>>) -> Self {
        Self { inside, outside }
    }

    /// An interface with the same medium on both sides.
    pub fn uniform(medium: Arc<MediumEnum>) -> Self {
        Self {
            inside: Some(medium.clone()),
            outside: Some(medium),
        }
    }

    /// Returns `true` if crossing the boundary changes the medium.
    pub fn is_transition(&self) -> bool {
        match (&self.inside, &self.outside) {
            (Some(inside), Some(outside)) => !Arc::ptr_eq(inside, outside),
            (None, None) => false,
            _ => true,
        }
    }
}
