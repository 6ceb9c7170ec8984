//! Catalog of devices keyed by (tag, category).
//!
//! Registration happens once, before the runner starts. Resolution is lazy: the first resolver
//! of an entry runs its factory and every later resolver shares the result, including a failed
//! one.

use embassy_sync::once_lock::OnceLock;

use crate::config::Configuration;
use crate::device::{
    Category, DeviceError, InputDevice, KeyboardOutput, MouseOutput, OutputDevice, ScreenOutput,
    Tag,
};

pub type Factory<T> = fn(&Configuration<'_>) -> Result<&'static T, DeviceError>;

#[derive(Clone, Copy)]
pub enum DeviceFactory {
    Input(Factory<dyn InputDevice>),
    Keyboard(Factory<dyn KeyboardOutput>),
    Mouse(Factory<dyn MouseOutput>),
    Screen(Factory<dyn ScreenOutput>),
}

impl DeviceFactory {
    pub fn category(&self) -> Category {
        match self {
            DeviceFactory::Input(_) => Category::InputDevice,
            DeviceFactory::Keyboard(_) => Category::KeyboardOutput,
            DeviceFactory::Mouse(_) => Category::MouseOutput,
            DeviceFactory::Screen(_) => Category::ScreenOutput,
        }
    }

    fn build(&self, config: &Configuration<'_>) -> Result<DeviceRef, DeviceError> {
        Ok(match self {
            DeviceFactory::Input(f) => DeviceRef::Input(f(config)?),
            DeviceFactory::Keyboard(f) => DeviceRef::Keyboard(f(config)?),
            DeviceFactory::Mouse(f) => DeviceRef::Mouse(f(config)?),
            DeviceFactory::Screen(f) => DeviceRef::Screen(f(config)?),
        })
    }
}

#[derive(Clone, Copy)]
pub enum DeviceRef {
    Input(&'static dyn InputDevice),
    Keyboard(&'static dyn KeyboardOutput),
    Mouse(&'static dyn MouseOutput),
    Screen(&'static dyn ScreenOutput),
}

impl DeviceRef {
    pub fn as_output(&self) -> Option<&'static dyn OutputDevice> {
        match *self {
            DeviceRef::Input(_) => None,
            DeviceRef::Keyboard(d) => Some(d),
            DeviceRef::Mouse(d) => Some(d),
            DeviceRef::Screen(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationError {
    AlreadyRegistered,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResolveError {
    NotRegistered,
    Device(DeviceError),
}

struct Entry {
    tag: Tag,
    is_primary: bool,
    factory: DeviceFactory,
    instance: OnceLock<Result<DeviceRef, DeviceError>>,
}

/// Registration details of one entry, as seen by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub tag: Tag,
    pub category: Category,
    pub is_primary: bool,
}

pub struct DeviceRegistry<'c, const N: usize> {
    config: Configuration<'c>,
    entries: heapless::Vec<Entry, N>,
}

impl<'c, const N: usize> DeviceRegistry<'c, N> {
    pub fn new(config: Configuration<'c>) -> Self {
        Self {
            config,
            entries: heapless::Vec::new(),
        }
    }

    pub fn config(&self) -> &Configuration<'c> {
        &self.config
    }

    pub fn register_keyboard_output(
        &mut self,
        tag: Tag,
        is_primary: bool,
        factory: Factory<dyn KeyboardOutput>,
    ) -> Result<(), RegistrationError> {
        self.register(tag, is_primary, DeviceFactory::Keyboard(factory))
    }

    pub fn register_mouse_output(
        &mut self,
        tag: Tag,
        is_primary: bool,
        factory: Factory<dyn MouseOutput>,
    ) -> Result<(), RegistrationError> {
        self.register(tag, is_primary, DeviceFactory::Mouse(factory))
    }

    pub fn register_screen_output(
        &mut self,
        tag: Tag,
        is_primary: bool,
        factory: Factory<dyn ScreenOutput>,
    ) -> Result<(), RegistrationError> {
        self.register(tag, is_primary, DeviceFactory::Screen(factory))
    }

    pub fn register_input_device(
        &mut self,
        tag: Tag,
        factory: Factory<dyn InputDevice>,
    ) -> Result<(), RegistrationError> {
        self.register(tag, false, DeviceFactory::Input(factory))
    }

    pub fn register(
        &mut self,
        tag: Tag,
        is_primary: bool,
        factory: DeviceFactory,
    ) -> Result<(), RegistrationError> {
        let category = factory.category();
        if self.find(tag, category).is_some() {
            crate::warn!("device {} {:?} already registered", tag, category);
            return Err(RegistrationError::AlreadyRegistered);
        }
        self.entries
            .push(Entry {
                tag,
                is_primary,
                factory,
                instance: OnceLock::new(),
            })
            .map_err(|_| RegistrationError::Full)
    }

    pub fn contains(&self, tag: Tag, category: Category) -> bool {
        self.find(tag, category).is_some()
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = EntryInfo> + '_ {
        self.entries.iter().map(|e| EntryInfo {
            tag: e.tag,
            category: e.factory.category(),
            is_primary: e.is_primary,
        })
    }

    pub fn resolve(&self, tag: Tag, category: Category) -> Result<DeviceRef, ResolveError> {
        let entry = self
            .find(tag, category)
            .ok_or(ResolveError::NotRegistered)?;
        let result = entry.instance.get_or_init(|| {
            let result = entry.factory.build(&self.config);
            if let Err(err) = result {
                crate::warn!("device {} {:?} failed to build: {:?}", tag, category, err);
            }
            result
        });
        (*result).map_err(ResolveError::Device)
    }

    pub fn resolve_input(&self, tag: Tag) -> Result<&'static dyn InputDevice, ResolveError> {
        match self.resolve(tag, Category::InputDevice)? {
            DeviceRef::Input(d) => Ok(d),
            _ => Err(ResolveError::NotRegistered),
        }
    }

    pub fn resolve_keyboard(&self, tag: Tag) -> Result<&'static dyn KeyboardOutput, ResolveError> {
        match self.resolve(tag, Category::KeyboardOutput)? {
            DeviceRef::Keyboard(d) => Ok(d),
            _ => Err(ResolveError::NotRegistered),
        }
    }

    pub fn resolve_mouse(&self, tag: Tag) -> Result<&'static dyn MouseOutput, ResolveError> {
        match self.resolve(tag, Category::MouseOutput)? {
            DeviceRef::Mouse(d) => Ok(d),
            _ => Err(ResolveError::NotRegistered),
        }
    }

    pub fn resolve_screen(&self, tag: Tag) -> Result<&'static dyn ScreenOutput, ResolveError> {
        match self.resolve(tag, Category::ScreenOutput)? {
            DeviceRef::Screen(d) => Ok(d),
            _ => Err(ResolveError::NotRegistered),
        }
    }

    fn find(&self, tag: Tag, category: Category) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.tag == tag && e.factory.category() == category)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod test;
