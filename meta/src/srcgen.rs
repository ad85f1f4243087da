//! C++ source text builder.
//!
//! `Formatter` collects lines of generated C++ into an in-memory buffer while
//! tracking indentation. It is the sole mechanism the emitter (`emit`) and the
//! decoder generator (`decoder`) use to produce text: nothing in this crate
//! touches the filesystem, matching the "pure function over in-memory
//! structures" contract for the translation core.

use std::cmp;

static SHIFTWIDTH: usize = 2;

/// Simplifies calling `Formatter::line` with a format string.
macro_rules! fmtln {
    ($fmt:ident, $fmtstring:expr, $($fmtargs:expr),*) => {
        $fmt.line(format!($fmtstring, $($fmtargs),*))
    };

    ($fmt:ident, $arg:expr) => {
        $fmt.line($arg)
    };
}

/// An indentation-aware line buffer.
///
/// `gen_cpp` and the decoder's code emission thread a single `Formatter`
/// through a tree walk; every node contributes its own lines without needing
/// to know the indentation depth of its caller.
pub struct Formatter {
    indent: usize,
    lines: Vec<String>,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            lines: Vec::new(),
        }
    }

    /// Formatter seeded at a given indentation depth (number of
    /// `indent_spaces`-wide steps), used when emitting a nested fragment
    /// (e.g. a function body) into a context that already has indentation.
    pub fn with_indent(indent: usize) -> Self {
        Self {
            indent,
            lines: Vec::new(),
        }
    }

    pub fn indent_push(&mut self) {
        self.indent += 1;
    }

    pub fn indent_pop(&mut self) {
        assert!(self.indent > 0, "already at top-level indentation");
        self.indent -= 1;
    }

    /// Runs `f` with indentation increased by one level for its duration.
    pub fn indent<T, F: FnOnce(&mut Formatter) -> T>(&mut self, f: F) -> T {
        self.indent_push();
        let ret = f(self);
        self.indent_pop();
        ret
    }

    fn get_indent(&self) -> String {
        if self.indent == 0 {
            String::new()
        } else {
            " ".repeat(self.indent * SHIFTWIDTH)
        }
    }

    /// Appends an indented line.
    pub fn line(&mut self, contents: impl AsRef<str>) {
        let indented = format!("{}{}\n", self.get_indent(), contents.as_ref());
        self.lines.push(indented);
    }

    /// Appends a line without the current indentation prefix (used to close
    /// a brace opened one level out, e.g. `} else {`).
    pub fn outdented_line(&mut self, contents: impl AsRef<str>) {
        let depth = self.indent.saturating_sub(1);
        let indented = format!("{}{}\n", " ".repeat(depth * SHIFTWIDTH), contents.as_ref());
        self.lines.push(indented);
    }

    pub fn empty_line(&mut self) {
        self.lines.push("\n".to_string());
    }

    /// Appends one or more lines after stripping the block's common leading
    /// indentation, for multi-line literal fragments.
    pub fn multi_line(&mut self, s: &str) {
        parse_multiline(s).into_iter().for_each(|l| self.line(&l));
    }

    pub fn comment(&mut self, s: impl AsRef<str>) {
        fmtln!(self, "// {}", s.as_ref());
    }

    /// Concatenates the buffer into the final C++ text. This is the only way
    /// generated text leaves a `Formatter`; callers (the emitter, the decoder
    /// generator, or tests) decide what to do with the returned `String`.
    pub fn into_string(self) -> String {
        self.lines.concat()
    }

    pub fn as_str_lines(&self) -> &[String] {
        &self.lines
    }
}

/// Splits a multi-line string into lines after removing the minimum common
/// indentation (ignoring the first and blank lines), and trims a leading and
/// trailing run of blank lines. Used for literal C++ fragments embedded in
/// Rust source with indentation matching the surrounding Rust code rather
/// than the desired C++ output.
fn parse_multiline(s: &str) -> Vec<String> {
    let expanded_tab = " ".repeat(SHIFTWIDTH);
    let lines: Vec<String> = s.lines().map(|l| l.replace('\t', &expanded_tab)).collect();

    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min();

    let mut lines_iter = lines.iter().skip_while(|l| l.is_empty());
    let mut trimmed = Vec::with_capacity(lines.len());

    if let Some(first) = lines_iter.next().map(|l| l.trim().to_string()) {
        trimmed.push(first);
    }

    let mut rest: Vec<String> = if let Some(indent) = indent {
        lines_iter
            .map(|l| &l[cmp::min(indent, l.len())..])
            .map(|l| l.trim_end().to_string())
            .collect()
    } else {
        lines_iter.map(|l| l.trim_end().to_string()).collect()
    };
    trimmed.append(&mut rest);

    while let Some(last) = trimmed.pop() {
        if last.is_empty() {
            continue;
        }
        trimmed.push(last);
        break;
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_indentation() {
        let mut fmt = Formatter::new();
        fmt.line("if (cond) {");
        fmt.indent(|fmt| {
            fmt.line("do_thing();");
        });
        fmt.line("}");
        assert_eq!(
            fmt.into_string(),
            "if (cond) {\n  do_thing();\n}\n"
        );
    }

    #[test]
    fn outdented_line_closes_at_parent_depth() {
        let mut fmt = Formatter::new();
        fmt.line("if (a) {");
        fmt.indent(|fmt| {
            fmt.line("x();");
            fmt.outdented_line("} else {");
            fmt.indent(|fmt| fmt.line("y();"));
        });
        fmt.line("}");
        assert_eq!(
            fmt.into_string(),
            "if (a) {\n  x();\n} else {\n    y();\n}\n"
        );
    }

    #[test]
    fn parse_multiline_strips_common_indent() {
        let input = "\n    a();\n    b();\n";
        assert_eq!(parse_multiline(input), vec!["a();", "b();"]);
    }
}
