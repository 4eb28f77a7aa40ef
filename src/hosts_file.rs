//! In-memory view of a hosts file with a single managed section.
//!
//! The managed section is a contiguous run of lines bounded by two fixed
//! comment markers. Everything outside it is kept verbatim, including
//! comments and lines that fail to parse.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::endpoint::ResolvedEndpoint;
use crate::error::{Result, SyncError, io_err};
use crate::hosts_line::HostsLine;

/// Line closing the managed section.
pub const END_OF_SECTION: &str = "# End of Section";

/// Start/end markers delimiting the managed section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarkers {
    start: String,
    end: String,
}

impl SectionMarkers {
    /// Markers for sections written by `agent`:
    ///
    /// ```text
    /// # Generate by <agent>. DO NOT EDIT
    /// ...
    /// # End of Section
    /// ```
    #[must_use]
    pub fn new(agent: &str) -> Self {
        Self {
            start: format!("# Generate by {agent}. DO NOT EDIT"),
            end: END_OF_SECTION.to_string(),
        }
    }

    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// The three lines of a section mapping `endpoint`.
    #[must_use]
    pub fn section_lines(&self, endpoint: &ResolvedEndpoint) -> [String; 3] {
        [self.start.clone(), endpoint.hosts_line(), self.end.clone()]
    }
}

/// Ordered lines of a hosts file bound to its path.
///
/// The line sequence always reflects the last successful load or flush,
/// plus whatever in-memory edits have been made since.
#[derive(Debug, Clone)]
pub struct HostsDocument {
    path: PathBuf,
    lines: Vec<HostsLine>,
}

impl HostsDocument {
    /// Reads and parses the file at `path`. A missing file is not created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lines = read_lines(&path)?;
        Ok(Self { path, lines })
    }

    /// Replaces the in-memory lines with the file's current content.
    ///
    /// On error the previous lines are kept.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        self.lines = read_lines(&self.path)?;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lines(&self) -> &[HostsLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the first well-formed line mapping `address`.
    #[must_use]
    pub fn position_of(&self, address: IpAddr) -> Option<usize> {
        self.lines.iter().position(|l| l.maps(address))
    }

    /// Names mapped to `address` by its first line, if any.
    #[must_use]
    pub fn hostnames_for(&self, address: IpAddr) -> Option<&[String]> {
        self.position_of(address)
            .map(|i| self.lines[i].hostnames.as_slice())
    }

    /// Maps `hostnames` to `address`.
    ///
    /// If a line already maps `address`, missing names are appended to it
    /// and the line is regenerated in place, keeping its trailing comment.
    /// Otherwise a new line is added at the end. Names are never duplicated
    /// by this call.
    pub fn add_address_mapping<S: AsRef<str>>(&mut self, address: IpAddr, hostnames: &[S]) {
        let (index, mut names, comment) = match self.position_of(address) {
            Some(i) => {
                let existing = &self.lines[i];
                let comment = existing.trailing_comment().map(str::to_string);
                (Some(i), existing.hostnames.clone(), comment)
            }
            None => (None, Vec::new(), None),
        };
        for name in hostnames {
            let name = name.as_ref();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        let mut line = HostsLine::from_mapping(address, &names);
        if let Some(comment) = comment {
            line = HostsLine::parse(format!("{} {comment}", line.raw));
        }
        match index {
            Some(i) => self.lines[i] = line,
            None => self.lines.push(line),
        }
    }

    /// Appends fully formed lines verbatim.
    pub fn append_raw_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(HostsLine::parse));
    }

    /// Lines of the current managed section, markers included.
    #[must_use]
    pub fn managed_section(&self, markers: &SectionMarkers) -> Option<&[HostsLine]> {
        let sections = self.section_bounds(markers).ok()?;
        let &(start, end) = sections.first()?;
        Some(&self.lines[start..=end])
    }

    /// Removes every managed section, markers included.
    ///
    /// Returns `true` if anything was removed, `false` if no section existed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StructuralIntegrity`] if a start marker has no
    /// end marker after it. The lines are left untouched in that case.
    pub fn cleanup_managed_section(&mut self, markers: &SectionMarkers) -> Result<bool> {
        let sections = self.section_bounds(markers)?;
        for &(start, end) in sections.iter().rev() {
            self.lines.drain(start..=end);
        }
        Ok(!sections.is_empty())
    }

    /// Swaps the managed section for one mapping `endpoint`.
    ///
    /// # Errors
    ///
    /// Propagates [`cleanup_managed_section`](Self::cleanup_managed_section)
    /// failures without appending anything.
    pub fn replace_managed_section(
        &mut self,
        markers: &SectionMarkers,
        endpoint: &ResolvedEndpoint,
    ) -> Result<()> {
        self.cleanup_managed_section(markers)?;
        self.append_raw_lines(markers.section_lines(endpoint));
        Ok(())
    }

    /// The exact bytes [`flush`](Self::flush) writes: one line per entry,
    /// each followed by `\n`.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Truncates the file, writes every line, then reloads from disk.
    ///
    /// If writing fails the in-memory lines are left as they were.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be created, written or
    /// read back.
    pub fn flush(&mut self) -> Result<()> {
        self.write_out().map_err(|e| io_err(&self.path, e))?;
        self.reload()
    }

    fn write_out(&self) -> std::io::Result<()> {
        let file = File::create(&self.path)?;
        let mut w = BufWriter::new(file);
        for line in &self.lines {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
        }
        let file = w.into_inner().map_err(std::io::IntoInnerError::into_error)?;
        file.sync_all()
    }

    /// Inclusive `(start, end)` index pairs of every section, in file order.
    fn section_bounds(&self, markers: &SectionMarkers) -> Result<Vec<(usize, usize)>> {
        let mut sections = Vec::new();
        let mut from = 0;
        while let Some(start) = self.lines[from..]
            .iter()
            .position(|l| is_marker(l, markers.start()))
            .map(|i| from + i)
        {
            let end = self.lines[start + 1..]
                .iter()
                .position(|l| is_marker(l, markers.end()))
                .map(|i| start + 1 + i)
                .ok_or_else(|| SyncError::StructuralIntegrity {
                    path: self.path.clone(),
                })?;
            sections.push((start, end));
            from = end + 1;
        }
        Ok(sections)
    }
}

fn is_marker(line: &HostsLine, marker: &str) -> bool {
    line.raw.trim_end() == marker
}

fn read_lines(path: &Path) -> Result<Vec<HostsLine>> {
    let content = std::fs::read(path).map_err(|e| io_err(path, e))?;
    if content.is_empty() {
        return Ok(Vec::new());
    }
    let body = content.strip_suffix(b"\n").unwrap_or(&content[..]);
    Ok(body
        .split(|&b| b == b'\n')
        .map(|line| HostsLine::parse_bytes(line.strip_suffix(b"\r").unwrap_or(line)))
        .collect())
}
