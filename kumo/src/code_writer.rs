use thiserror::Error;

use std::io;

/// Line-oriented text writer with an indentation level, used for netlist dumps.
pub struct CodeWriter<'a, W: io::Write> {
    w: &'a mut W,
    indent_level: u32,
}

impl<'a, W: io::Write> CodeWriter<'a, W> {
    pub fn new(w: &'a mut W) -> CodeWriter<'a, W> {
        CodeWriter {
            w,
            indent_level: 0,
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn unindent(&mut self) -> Result<(), CodeWriterError> {
        if self.indent_level == 0 {
            return Err(CodeWriterError::IndentUnderflow);
        }
        self.indent_level -= 1;
        Ok(())
    }

    pub fn append_indent(&mut self) -> Result<(), CodeWriterError> {
        for _ in 0..self.indent_level {
            write!(self.w, "    ")?;
        }
        Ok(())
    }

    pub fn append_newline(&mut self) -> Result<(), CodeWriterError> {
        writeln!(self.w)?;
        Ok(())
    }

    pub fn append(&mut self, s: &str) -> Result<(), CodeWriterError> {
        write!(self.w, "{}", s)?;
        Ok(())
    }

    pub fn append_line(&mut self, s: &str) -> Result<(), CodeWriterError> {
        self.append_indent()?;
        self.append(s)?;
        self.append_newline()?;
        Ok(())
    }

    /// Writes `header` as a line and runs `f` one indentation level deeper.
    pub fn section(
        &mut self,
        header: &str,
        f: impl FnOnce(&mut Self) -> Result<(), CodeWriterError>,
    ) -> Result<(), CodeWriterError> {
        self.append_line(header)?;
        self.indent();
        f(self)?;
        self.unindent()
    }
}

#[derive(Error, Debug)]
pub enum CodeWriterError {
    #[error("indent level underflow")]
    IndentUnderflow,

    #[error("netlist I/O error")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_sections_are_indented() {
        let mut buf = Vec::new();
        let mut w = CodeWriter::new(&mut buf);

        w.section("module A:", |w| {
            w.section("signals:", |w| w.append_line("i: input 1 bit(s)"))?;
            w.append_line("instances:")
        })
        .unwrap();
        w.append_line("end").unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "module A:\n    signals:\n        i: input 1 bit(s)\n    instances:\nend\n"
        );
    }

    #[test]
    fn unindent_underflow() {
        let mut buf = Vec::new();
        let mut w = CodeWriter::new(&mut buf);

        assert!(matches!(w.unindent(), Err(CodeWriterError::IndentUnderflow)));
    }
}
