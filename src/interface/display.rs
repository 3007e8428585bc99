use serde::{Deserialize, Serialize};

/// Display rotation as reported by the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    None,
    Rotation90,
    Rotation180,
    Rotation270,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsCard {
    pub index: usize,
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
}

impl PartialEq for GraphicsCard {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for GraphicsCard {}

impl std::hash::Hash for GraphicsCard {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

/// An output attached to a graphics card. Two displays are the same display
/// when their indices match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Display {
    pub index: usize,
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub rotation: Rotation,
    pub graphics_card: GraphicsCard,
}

impl Display {
    pub fn contains(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        width > 0
            && height > 0
            && x.checked_add(width).is_some_and(|right| right <= self.width)
            && y.checked_add(height).is_some_and(|bottom| bottom <= self.height)
    }
}

impl PartialEq for Display {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Display {}

impl std::hash::Hash for Display {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(index: usize, width: usize, height: usize) -> Display {
        Display {
            index,
            name: format!("Display {index}"),
            width,
            height,
            rotation: Rotation::None,
            graphics_card: GraphicsCard {
                index: 0,
                name: "Test Adapter".into(),
                vendor_id: 0,
                device_id: 0,
            },
        }
    }

    #[test]
    fn equality_is_by_index() {
        let a = display(1, 1920, 1080);
        let mut b = display(1, 640, 480);
        b.name = "Renamed".into();
        assert_eq!(a, b);
        assert_ne!(a, display(2, 1920, 1080));
    }

    #[test]
    fn contains_checks_bounds_and_size() {
        let d = display(0, 100, 50);
        assert!(d.contains(0, 0, 100, 50));
        assert!(d.contains(99, 49, 1, 1));
        assert!(!d.contains(0, 0, 0, 10));
        assert!(!d.contains(1, 0, 100, 50));
        assert!(!d.contains(0, 0, 100, 51));
        assert!(!d.contains(usize::MAX, 0, 2, 1));
    }
}
