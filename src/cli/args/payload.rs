//! Payload arguments for create and update

use clap::Args;

use adminop::error::ValidationError;
use adminop::resource::Record;
use adminop::validation::build_payload;

/// Entity fields, as a JSON object and/or individual assignments.
#[derive(Args, Debug, Default, Clone)]
pub struct PayloadArgs {
    /// Fields as a JSON object, e.g. '{"name": "rust"}'
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Set one field, e.g. --set color=red (repeatable, overrides --data)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,
}

impl PayloadArgs {
    pub fn to_record(&self) -> Result<Record, ValidationError> {
        build_payload(self.data.as_deref(), &self.assignments)
    }
}
