pub mod error;
pub mod error_code;
pub mod name_value;
pub mod options;

pub use error_code::ErrorCode;
pub use name_value::{name_value_list, NameValue};
pub use options::{
    check_parameters, GetEntriesCountOptions, GetEntriesOptions, GetEntryListOptions,
    GetModuleFieldsOptions, GetRelationshipsOptions, ParamKind, SearchByModuleOptions,
    SetRelationshipOptions,
};
