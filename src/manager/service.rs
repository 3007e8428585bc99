use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::api::dto::CaptureConfig;
use crate::error::CaptureError;
use crate::interface::backend::BackendMetadata;
use crate::interface::display::{Display, GraphicsCard};

use super::inventory::resolve_backend;
use super::ScreenCapture;

/// Entry point for applications: enumerates displays through a registered
/// backend and hands out one shared [`ScreenCapture`] per display.
pub struct ScreenCaptureService {
    backend: &'static BackendMetadata,
    config: CaptureConfig,
    captures: Mutex<HashMap<usize, Arc<ScreenCapture>>>,
    disposed: AtomicBool,
}

impl ScreenCaptureService {
    /// Uses the backend named in `config`, or the first registered one.
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        let backend = resolve_backend(config.backend.as_deref()).ok_or_else(|| {
            CaptureError::UnknownBackend(config.backend.clone().unwrap_or_default())
        })?;
        Ok(Self::with_backend(backend, config))
    }

    pub fn with_backend(backend: &'static BackendMetadata, config: CaptureConfig) -> Self {
        log::info!(backend = backend.id; "Screen capture service created");
        Self {
            backend,
            config,
            captures: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &'static BackendMetadata {
        self.backend
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn ensure_alive(&self) -> Result<(), CaptureError> {
        if self.disposed.load(Ordering::Acquire) {
            Err(CaptureError::ResourceDisposed)
        } else {
            Ok(())
        }
    }

    pub fn displays(&self) -> Result<Vec<Display>, CaptureError> {
        self.ensure_alive()?;
        Ok((self.backend.list_displays)()?)
    }

    /// Distinct graphics cards owning at least one display, in display order.
    pub fn graphics_cards(&self) -> Result<Vec<GraphicsCard>, CaptureError> {
        let mut cards: Vec<GraphicsCard> = Vec::new();
        for display in self.displays()? {
            if !cards.contains(&display.graphics_card) {
                cards.push(display.graphics_card);
            }
        }
        Ok(cards)
    }

    pub fn displays_of(&self, card: &GraphicsCard) -> Result<Vec<Display>, CaptureError> {
        Ok(self
            .displays()?
            .into_iter()
            .filter(|display| display.graphics_card == *card)
            .collect())
    }

    /// The capture for `display`, created on first request.
    pub fn screen_capture(&self, display: &Display) -> Result<Arc<ScreenCapture>, CaptureError> {
        self.ensure_alive()?;
        let mut captures = self.captures.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_alive()?;

        if let Some(capture) = captures.get(&display.index) {
            if !capture.is_disposed() {
                return Ok(capture.clone());
            }
        }

        let backend = (self.backend.create)(display, &self.config)?;
        let capture = Arc::new(ScreenCapture::new(
            display.clone(),
            backend,
            self.config.clone(),
        ));
        captures.insert(display.index, capture.clone());

        log::debug!(backend = self.backend.id, display = display.index; "Screen capture created");
        Ok(capture)
    }

    /// Disposes and forgets the capture for `display`. Returns whether one
    /// existed.
    pub fn release(&self, display: &Display) -> bool {
        let removed = self
            .captures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&display.index);

        match removed {
            Some(capture) => {
                capture.dispose();
                true
            }
            None => false,
        }
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let captures: Vec<_> = self
            .captures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, capture)| capture)
            .collect();
        for capture in captures {
            capture.dispose();
        }
    }
}

impl Drop for ScreenCaptureService {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::backend::DynCaptureBackend;
    use crate::interface::color::ColorBgra;
    use crate::interface::display::Rotation;
    use crate::manager::inventory::{find_backend, list_backends};
    use crate::manager::CaptureState;
    use crate::resource::screen::{FrameFeed, MemoryCaptureBackend, ScreenCaptureError};

    fn card(index: usize) -> GraphicsCard {
        GraphicsCard {
            index,
            name: format!("Adapter {index}"),
            vendor_id: 0x10DE,
            device_id: index as u32,
        }
    }

    fn test_displays() -> Result<Vec<Display>, ScreenCaptureError> {
        Ok([(0, 32, 32, 0), (1, 16, 16, 0), (2, 8, 8, 1)]
            .into_iter()
            .map(|(index, width, height, card_index)| Display {
                index,
                name: format!("Test {index}"),
                width,
                height,
                rotation: Rotation::None,
                graphics_card: card(card_index),
            })
            .collect())
    }

    fn test_create(
        _display: &Display,
        _config: &CaptureConfig,
    ) -> Result<DynCaptureBackend, ScreenCaptureError> {
        Ok(Box::new(MemoryCaptureBackend::new(FrameFeed::<ColorBgra>::new())))
    }

    inventory::submit!(BackendMetadata {
        id: "test-memory",
        name: "Test memory",
        description: "Unit test backend without frames",
        list_displays: test_displays,
        create: test_create,
    });

    fn service() -> ScreenCaptureService {
        ScreenCaptureService::new(CaptureConfig {
            backend: Some("Test-Memory".into()),
            ..CaptureConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn registry_lists_submitted_backends() {
        assert!(list_backends().iter().any(|b| b.id == "test-memory"));
        assert!(find_backend("test-memory").is_some());
        assert!(find_backend("does-not-exist").is_none());
    }

    #[test]
    fn unknown_backend_is_reported() {
        let result = ScreenCaptureService::new(CaptureConfig {
            backend: Some("does-not-exist".into()),
            ..CaptureConfig::default()
        });
        assert!(matches!(result, Err(CaptureError::UnknownBackend(name)) if name == "does-not-exist"));
    }

    #[test]
    fn enumerates_cards_and_displays() {
        let service = service();
        let cards = service.graphics_cards().unwrap();
        assert_eq!(cards.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(service.displays().unwrap().len(), 3);
        assert_eq!(service.displays_of(&cards[1]).unwrap()[0].index, 2);
    }

    #[test]
    fn captures_are_shared_per_display() {
        let service = service();
        let displays = service.displays().unwrap();

        let first = service.screen_capture(&displays[0]).unwrap();
        let again = service.screen_capture(&displays[0]).unwrap();
        let other = service.screen_capture(&displays[1]).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));

        assert!(service.release(&displays[0]));
        assert!(!service.release(&displays[0]));
        assert_eq!(first.state(), CaptureState::Disposed);

        let fresh = service.screen_capture(&displays[0]).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        // No frame pushed yet.
        assert_eq!(fresh.capture_screen(), Ok(false));
    }

    #[test]
    fn dispose_disposes_every_capture() {
        let service = service();
        let displays = service.displays().unwrap();
        let capture = service.screen_capture(&displays[2]).unwrap();

        service.dispose();
        service.dispose();
        assert!(capture.is_disposed());
        assert!(matches!(service.displays(), Err(CaptureError::ResourceDisposed)));
        assert!(matches!(
            service.screen_capture(&displays[2]),
            Err(CaptureError::ResourceDisposed)
        ));
    }
}
