//! The `Context` owns everything a realization touches: the day-keyed plan
//! queue and the typed data plugins that modules register to hold their state.
use std::any::{Any, TypeId};

use log::trace;

use crate::plan::Queue;
use crate::HashMap;

/// A trait for objects that can provide data containers to be held by `Context`
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new type for storing data in `Context`.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

/// Plans scheduled for the same day run in phase order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExecutionPhase {
    First,
    Normal,
    Last,
}

type Callback = dyn FnOnce(&mut Context);

pub struct Context {
    plan_queue: Queue<Box<Callback>, ExecutionPhase>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_day: u32,
    shutdown_requested: bool,
}

impl Context {
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            data_plugins: HashMap::default(),
            current_day: 0,
            shutdown_requested: false,
        }
    }

    /// Schedules `callback` to run on `day` in the `Normal` phase.
    ///
    /// # Panics
    ///
    /// Panics if `day` is earlier than the current day.
    pub fn add_plan(&mut self, day: u32, callback: impl FnOnce(&mut Context) + 'static) {
        self.add_plan_with_phase(day, callback, ExecutionPhase::Normal);
    }

    /// Schedules `callback` to run on `day` in the given phase.
    ///
    /// # Panics
    ///
    /// Panics if `day` is earlier than the current day.
    pub fn add_plan_with_phase(
        &mut self,
        day: u32,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(
            day >= self.current_day,
            "plan for day {day} scheduled on day {}",
            self.current_day
        );
        trace!("adding plan at day {day} ({phase:?})");
        self.plan_queue.add_plan(day, Box::new(callback), phase);
    }

    /// Returns a mutable reference to the data container of `T`, creating it if it doesn't
    /// exist yet.
    #[allow(clippy::missing_panics_doc)]
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .unwrap() // Will never panic as data container has the matching type
    }

    /// Returns a reference to the data container of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the container was never created through `get_data_mut`.
    pub fn get_data<T: DataPlugin>(&self, plugin: T) -> &T::DataContainer {
        self.try_get_data(plugin)
            .unwrap_or_else(|| panic!("{} used before initialization", std::any::type_name::<T>()))
    }

    /// Returns a reference to the data container of `T` if it exists.
    pub fn try_get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    pub fn get_current_day(&self) -> u32 {
        self.current_day
    }

    /// Stops execution after the current plan, dropping everything still queued.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested on day {}", self.current_day);
        self.shutdown_requested = true;
    }

    /// Rewinds the clock to day zero so another realization can be scheduled.
    ///
    /// # Panics
    ///
    /// Panics if plans are still pending.
    pub fn reset_clock(&mut self) {
        assert!(
            self.plan_queue.is_empty(),
            "cannot rewind the clock while plans are pending"
        );
        self.current_day = 0;
        self.shutdown_requested = false;
    }

    /// Runs plans in day and phase order until none are left or `shutdown` is called.
    pub fn execute(&mut self) {
        loop {
            if self.shutdown_requested {
                self.plan_queue.clear();
                break;
            }

            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_day = plan.day;
                (plan.data)(self);
            } else {
                break;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
