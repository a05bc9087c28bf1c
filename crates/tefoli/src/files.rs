//! Feeding program files through a theory's rewriter
//!
//! The host parses program text into statements; every statement is rewritten
//! by the theory and the results are handed to the caller's `add` closure.
//! Parsing itself is the host's job and is abstracted by [`ProgramParser`].

use crate::error::{TheoryError, TheoryResult};
use crate::host::Statement;
use crate::theory::Theory;
use std::fmt::Display;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Name that stands for standard input
pub const STDIN: &str = "-";

/// Host parser turning program text into statements
pub trait ProgramParser {
    /// Parse `program`, calling `on_statement` for every statement in order
    ///
    /// An error from `on_statement` must abort parsing and be returned.
    fn parse_program(
        &mut self,
        program: &str,
        on_statement: &mut dyn FnMut(Statement) -> TheoryResult<()>,
    ) -> TheoryResult<()>;
}

impl<P> ProgramParser for P
where
    P: FnMut(&str, &mut dyn FnMut(Statement) -> TheoryResult<()>) -> TheoryResult<()>,
{
    fn parse_program(
        &mut self,
        program: &str,
        on_statement: &mut dyn FnMut(Statement) -> TheoryResult<()>,
    ) -> TheoryResult<()> {
        self(program, on_statement)
    }
}

/// Rewrite every statement of `program`
pub fn parse_str<P, F, E>(program: &str, theory: &mut Theory, parser: &mut P, add: &mut F) -> TheoryResult<()>
where
    P: ProgramParser + ?Sized,
    F: FnMut(Statement) -> Result<(), E>,
    E: Display,
{
    parser.parse_program(program, &mut |stm| theory.rewrite_statement(stm, &mut *add))
}

/// Read a whole program from `reader` and rewrite it
///
/// `name` is only used in error messages.
pub fn parse_reader<R, P, F, E>(
    name: &Path,
    mut reader: R,
    theory: &mut Theory,
    parser: &mut P,
    add: &mut F,
) -> TheoryResult<()>
where
    R: Read,
    P: ProgramParser + ?Sized,
    F: FnMut(Statement) -> Result<(), E>,
    E: Display,
{
    let mut program = String::new();
    reader
        .read_to_string(&mut program)
        .map_err(|source| TheoryError::Io {
            path: name.to_path_buf(),
            source,
        })?;
    parse_str(&program, theory, parser, add)
}

/// Rewrite the given files in order
///
/// `-` reads standard input; an empty list reads standard input only.
pub fn parse_files<S, P, F, E>(files: &[S], theory: &mut Theory, parser: &mut P, add: &mut F) -> TheoryResult<()>
where
    S: AsRef<Path>,
    P: ProgramParser + ?Sized,
    F: FnMut(Statement) -> Result<(), E>,
    E: Display,
{
    if files.is_empty() {
        return parse_stdin(theory, parser, add);
    }

    for file in files {
        let path = file.as_ref();
        if path == Path::new(STDIN) {
            parse_stdin(theory, parser, add)?;
            continue;
        }
        tracing::debug!(path = %path.display(), "rewriting program file");
        let program = fs::read_to_string(path).map_err(|source| TheoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_str(&program, theory, parser, add)?;
    }
    Ok(())
}

fn parse_stdin<P, F, E>(theory: &mut Theory, parser: &mut P, add: &mut F) -> TheoryResult<()>
where
    P: ProgramParser + ?Sized,
    F: FnMut(Statement) -> Result<(), E>,
    E: Display,
{
    tracing::debug!("rewriting program from standard input");
    parse_reader(&PathBuf::from("<stdin>"), io::stdin().lock(), theory, parser, add)
}
