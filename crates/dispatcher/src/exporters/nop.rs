//! NopExporter - accepts and drops everything

use async_trait::async_trait;
use contracts::{Batch, Context, ContractError, Exporter};

pub struct NopExporter {
    name: String,
}

impl NopExporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Exporter for NopExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, _ctx: &Context, _batch: Batch) -> Result<(), ContractError> {
        Ok(())
    }
}
