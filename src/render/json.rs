use std::io::Write;

use crate::error::Result;
use crate::events::WizardEvent;
use crate::render::EventSink;

/// One serialized event per line, for editors and CI wrappers.
pub struct JsonLines<W> {
    out: W,
}

impl<W: Write + Send> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> EventSink for JsonLines<W> {
    fn render(&mut self, event: &WizardEvent) -> Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
