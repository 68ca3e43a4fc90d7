//! Data models for the administration backend.
//!
//! This module contains the records managed through the admin CRUD
//! endpoints:
//!
//! - `ExamType`: kind of examination a time slot offers
//! - `TimeSlot`: daily window with a share of the registration capacity
//! - `DailyOverride`: registration limit for one specific day
//! - `Setting`: free-form key/value configuration entry

pub mod daily_override;
pub mod exam_type;
pub mod setting;
pub mod time_slot;

pub use daily_override::DailyOverride;
pub use exam_type::ExamType;
pub use setting::Setting;
pub use time_slot::{slot_capacities, TimeSlot};
