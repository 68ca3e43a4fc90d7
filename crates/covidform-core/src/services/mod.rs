//! Admin services layered on the authenticated session.
//!
//! `CrudService` covers list/create/update/delete for every admin record
//! type; `settings` adds the key/value conventions used for general
//! settings.

pub mod crud;
pub mod settings;

pub use crud::{
    CrudOutcome, CrudService, DailyOverrideService, ExamTypeService, RequestFailure, Resource,
    SettingService, TimeSlotService,
};
pub use settings::{daily_registration_limit, load_settings, save_setting, settings_to_map, Settings, ERROR_CODE_NOT_FOUND};
