use std::io::{BufRead, Write};

use anyhow::Context;
use tracing::{debug, error};

use crate::{
    aggregate,
    query,
    selection::{parse_count, Field, Selection},
    store::Store,
    table,
};

const MENU: &str = "
+-------------------------------------------------------+
|                       TICKSTORE                       |
+-------------------------------------------------------+
| 1 - Get last n metrics for all variables              |
| 2 - Get last n metrics for one or more variables      |
| 3 - Get an average of the value of one or more vars   |
| 0 - Exit                                              |
+-------------------------------------------------------+
";

enum Step {
    Continue,
    Quit,
}

/// Interactive menu over any line source, so it can be scripted.
pub struct Console<R, W> {
    store: Store,
    input: R,
    output: W,
}
impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(store: Store, input: R, output: W) -> Self {
        Self {
            store,
            input,
            output,
        }
    }
    pub fn into_output(self) -> W {
        self.output
    }

    /// Returns `None` once input is exhausted.
    fn prompt(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("reading input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            write!(self.output, "{MENU}")?;
            let Some(choice) = self.prompt(">> Option: ")? else {
                break;
            };
            debug!(option = %choice, "menu");
            let step = match choice.as_str() {
                "0" => Step::Quit,
                "1" => self.show_last_n(false)?,
                "2" => self.show_last_n(true)?,
                "3" => self.show_averages()?,
                "" => Step::Continue,
                other => {
                    writeln!(self.output, "Unknown option {other:?}")?;
                    Step::Continue
                }
            };
            if let Step::Quit = step {
                break;
            }
        }
        Ok(())
    }

    /// Asks `[y/n]` for every field; `None` on end of input.
    fn pick_fields(&mut self) -> anyhow::Result<Option<Vec<Field>>> {
        writeln!(self.output)?;
        let mut fields = vec![];
        for field in Field::ALL {
            let Some(answer) = self.prompt(&format!(">> {} [y/n]: ", field.label()))? else {
                return Ok(None);
            };
            if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
                fields.push(field);
            }
        }
        Ok(Some(fields))
    }

    fn show_last_n(&mut self, pick: bool) -> anyhow::Result<Step> {
        let Some(count) = self.prompt("\n>> How many metrics: ")? else {
            return Ok(Step::Quit);
        };
        let count = match parse_count(&count) {
            Ok(count) => count,
            Err(err) => {
                writeln!(self.output, "{err}")?;
                return Ok(Step::Continue);
            }
        };
        let selection = if pick {
            let Some(fields) = self.pick_fields()? else {
                return Ok(Step::Quit);
            };
            match Selection::new(fields, count) {
                Ok(selection) => selection,
                Err(err) => {
                    writeln!(self.output, "{err}")?;
                    return Ok(Step::Continue);
                }
            }
        } else {
            Selection::all(count)
        };
        match query::last_n(&self.store, &selection) {
            Ok(result) => write!(self.output, "{}", table::last_n(&selection, &result))?,
            Err(err) => {
                error!(%err, "last n query failed");
                writeln!(self.output, "Query failed: {err}")?;
            }
        }
        Ok(Step::Continue)
    }

    fn show_averages(&mut self) -> anyhow::Result<Step> {
        let Some(fields) = self.pick_fields()? else {
            return Ok(Step::Quit);
        };
        let selection = match Selection::new(fields, 0) {
            Ok(selection) => selection,
            Err(err) => {
                writeln!(self.output, "{err}")?;
                return Ok(Step::Continue);
            }
        };
        match aggregate::average(&self.store, &selection) {
            Ok(averages) => write!(self.output, "{}", table::averages(&averages))?,
            Err(err) => {
                error!(%err, "average query failed");
                writeln!(self.output, "Query failed: {err}")?;
            }
        }
        Ok(Step::Continue)
    }
}
