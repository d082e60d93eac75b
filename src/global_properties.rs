//! A generic mechanism for storing context-wide data. Global properties are
//! typed, immutable once set, and validated when they are set.
//!
//! Properties are defined with `define_global_property!`:
//!
//! ```
//! use sirlabor::define_global_property;
//! use sirlabor::error::SirLaborError;
//!
//! define_global_property!(Horizon, u32, |days: &u32| {
//!     if *days == 0 {
//!         return Err(SirLaborError::ConfigError("horizon must be positive".to_string()));
//!     }
//!     Ok(())
//! });
//! ```
//!
//! Values usually come from a JSON document read with
//! `ContextGlobalPropertiesExt::load_parameters_from_json`.
use std::any::{Any, TypeId};
use std::fs;
use std::path::Path;

use log::trace;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::SirLaborError;
use crate::{define_data_plugin, HashMap};

/// Defines a global property with the following parameters:
/// * `$global_property`: Name for the identifier type of the global property
/// * `$value`: The type of the property's value
/// * `$validate`: A function (or closure) that checks the validity of the property (optional)
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate: expr) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn validate(val: &$value) -> Result<(), $crate::error::SirLaborError> {
                $validate(val)
            }
        }
    };

    ($global_property: ident, $value: ty) => {
        $crate::define_global_property!($global_property, $value, |_| { Ok(()) });
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any;

    /// # Errors
    /// Returns an error when `value` is outside the property's domain.
    fn validate(value: &Self::Value) -> Result<(), SirLaborError>;
}

#[derive(Default)]
struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer::default()
);

pub trait ContextGlobalPropertiesExt {
    /// Sets the value of a global property after validating it.
    ///
    /// # Errors
    /// Returns an error if the property was already set or the value does not validate.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), SirLaborError>;

    /// Returns the value of a global property, or `None` if it was never set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Reads a JSON document into `T`.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or its contents don't deserialize into `T`.
    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, SirLaborError>;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), SirLaborError> {
        T::validate(&value)?;
        let data_container = self.get_data_mut(GlobalPropertiesPlugin);
        if data_container
            .global_property_container
            .contains_key(&TypeId::of::<T>())
        {
            return Err(SirLaborError::ConfigError(format!(
                "global property {} is already set",
                std::any::type_name::<T>()
            )));
        }
        trace!("setting global property {}", std::any::type_name::<T>());
        data_container
            .global_property_container
            .insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.try_get_data(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T::Value>())
    }

    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, SirLaborError> {
        trace!("loading parameters from {}", file_path.display());
        let config_file = fs::read_to_string(file_path)?;
        let config = serde_json::from_str(&config_file)?;
        Ok(config)
    }
}
