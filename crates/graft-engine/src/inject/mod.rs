//! Injection: the declaration cloner, modification traits, the driver and
//! metaclass expansion

pub mod driver;
pub mod injector;
pub mod metaclass;
pub mod mods;

pub use driver::{describe_injection_target, InjectionInfo, InjectionRequest, RequestState};
pub use injector::{classify, InjectionContext, Injector, RemapTable, Resolution};
pub use mods::{check_modifications, find_modifications, AccessMod, Modifications, StorageMod};
