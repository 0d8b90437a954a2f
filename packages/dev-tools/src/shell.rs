//! Line-oriented tree shell
//!
//! A minimal host for the editor: commands arrive one per line, the visible
//! rows are printed as text after every change, and name conflicts are
//! answered on the same input stream.

use anyhow::{anyhow, bail, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use treeview_core::surface::{PromptRequest, PromptResponse, RowGridSurface};
use treeview_core::{
    EditorSession, HostEvent, KeyCommand, MenuCommand, ModalPrompt, NodeId, RenderSurface,
};

use crate::persistence::save_document;

pub const HELP: &str = "\
Commands (nodes are addressed by label, e.g. 0_1):
  ls                     show visible rows
  dump                   show every node, collapsed ones included
  click <label>          select only this node
  ctrl <label>           toggle this node in the selection
  drag <row> <row>       rectangle-select between two row numbers
  focus <label>          set the focus row
  open|close <label>     expand or collapse a folder
  up|down                extend the selection from the focus row
  all | esc              select everything / clear the selection
  cut | copy | paste | delete | undo
  new-item | new-folder | rename
  save | quit | abort    quit saves first, abort does not";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Dump,
    Click { label: String, toggle: bool },
    Drag { from: usize, to: usize },
    Focus(String),
    Open { label: String, open: bool },
    Key(KeyCommand),
    Menu(MenuCommand),
    Save,
    Help,
    Quit { save: bool },
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let mut label = |verb: &str| {
            words
                .next()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{} needs a node label", verb))
        };

        let command = match verb {
            "ls" => Self::Show,
            "dump" => Self::Dump,
            "click" => Self::Click {
                label: label(verb)?,
                toggle: false,
            },
            "ctrl" => Self::Click {
                label: label(verb)?,
                toggle: true,
            },
            "drag" => {
                let from = label(verb)?;
                let to = label(verb)?;
                Self::Drag {
                    from: parse_row(&from)?,
                    to: parse_row(&to)?,
                }
            }
            "focus" => Self::Focus(label(verb)?),
            "open" => Self::Open {
                label: label(verb)?,
                open: true,
            },
            "close" => Self::Open {
                label: label(verb)?,
                open: false,
            },
            "up" => Self::Key(KeyCommand::ExtendUp),
            "down" => Self::Key(KeyCommand::ExtendDown),
            "all" => Self::Key(KeyCommand::SelectAll),
            "esc" => Self::Key(KeyCommand::Escape),
            "cut" => Self::Key(KeyCommand::Cut),
            "copy" => Self::Key(KeyCommand::Copy),
            "paste" => Self::Key(KeyCommand::Paste),
            "delete" => Self::Key(KeyCommand::Delete),
            "undo" => Self::Key(KeyCommand::Undo),
            "new-item" => Self::Menu(MenuCommand::NewItem),
            "new-folder" => Self::Menu(MenuCommand::NewFolder),
            "rename" => Self::Menu(MenuCommand::Rename),
            "save" => Self::Save,
            "help" | "?" => Self::Help,
            "quit" => Self::Quit { save: true },
            "abort" => Self::Quit { save: false },
            other => bail!("Unknown command '{}' (try 'help')", other),
        };
        Ok(Some(command))
    }
}

fn parse_row(word: &str) -> Result<usize> {
    word.parse()
        .map_err(|_| anyhow!("'{}' is not a row number", word))
}

/// Result of one shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Output(String),
    Quit,
}

/// Editor session bound to a text "widget" and a document file
pub struct Shell {
    session: EditorSession,
    surface: RowGridSurface,
    path: PathBuf,
}

impl Shell {
    pub fn new(mut session: EditorSession, path: PathBuf) -> Self {
        let mut surface = RowGridSurface::with_rows(RowGridSurface::DEFAULT_ROW_HEIGHT, 500);
        session.sync(&mut surface);
        Self {
            session,
            surface,
            path,
        }
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    /// Parse and run one line
    pub fn run_line(&mut self, line: &str, prompt: &mut dyn ModalPrompt) -> Result<Outcome> {
        match Command::parse(line)? {
            Some(command) => self.execute(command, prompt),
            None => Ok(Outcome::Output(String::new())),
        }
    }

    pub fn execute(&mut self, command: Command, prompt: &mut dyn ModalPrompt) -> Result<Outcome> {
        match command {
            Command::Show => {}
            Command::Dump => return Ok(Outcome::Output(self.session.store().dump())),
            Command::Help => return Ok(Outcome::Output(HELP.to_string())),
            Command::Save => {
                self.save()?;
                return Ok(Outcome::Output(format!("Saved to {}", self.path.display())));
            }
            Command::Quit { save } => {
                if save {
                    self.save()?;
                }
                return Ok(Outcome::Quit);
            }
            Command::Click { label, toggle } => {
                let id = self.resolve(&label)?;
                self.session.click(id, toggle)?;
                self.session.sync(&mut self.surface);
            }
            Command::Focus(label) => {
                let id = self.resolve(&label)?;
                self.dispatch(HostEvent::Menu(MenuCommand::Focus(id)), prompt);
            }
            Command::Open { label, open } => {
                let id = self.resolve(&label)?;
                self.dispatch(HostEvent::Toggle { id, open }, prompt);
            }
            Command::Drag { from, to } => {
                let rows = self.surface.rows().len();
                if from >= rows || to >= rows {
                    bail!("Row out of range (0..{})", rows);
                }
                let start = self.surface.row_center(from);
                let end = self.surface.row_center(to);
                self.dispatch(HostEvent::Press { point: start, toggle: false }, prompt);
                self.dispatch(HostEvent::Motion { point: end }, prompt);
                self.dispatch(HostEvent::Release { point: end }, prompt);
            }
            Command::Key(key) => self.dispatch(HostEvent::Key(key), prompt),
            Command::Menu(menu) => self.dispatch(HostEvent::Menu(menu), prompt),
        }
        Ok(Outcome::Output(self.render()))
    }

    fn dispatch(&mut self, event: HostEvent, prompt: &mut dyn ModalPrompt) {
        self.session.handle(event, &mut self.surface, prompt);
        self.session.run_deferred(&mut self.surface);
    }

    fn resolve(&self, label: &str) -> Result<NodeId> {
        self.session
            .store()
            .find_by_label(label)
            .ok_or_else(|| anyhow!("No node labelled '{}'", label))
    }

    fn save(&self) -> Result<()> {
        save_document(&self.path, &self.session.to_document())
    }

    /// Visible rows as text, one per line
    ///
    /// ```text
    /// >  0 [-] Folder 0         0      Folder  odd selected
    ///    1     photo1.png       0_0    Item    even
    /// ```
    pub fn render(&self) -> String {
        let store = self.session.store();
        let focus = self.session.focus();
        let mut out = String::new();

        for (position, id) in self.surface.rows().iter().enumerate() {
            if !self.surface.is_visible(*id) {
                continue;
            }
            let depth = depth_of(store, *id);
            let marker = if !store.is_container(Some(*id)) {
                "   "
            } else if store.is_open(*id) {
                "[-]"
            } else {
                "[+]"
            };
            let name = format!(
                "{}{} {}",
                "  ".repeat(depth),
                marker,
                store.text(*id).unwrap_or_default()
            );
            let class = self
                .surface
                .class_of(*id)
                .map(|state| state.class_name())
                .unwrap_or_default();

            out.push_str(&format!(
                "{}{:>3} {:<32} {:<8} {:<8} {}\n",
                if focus == Some(*id) { ">" } else { " " },
                position,
                name,
                store.label(*id).unwrap_or_default(),
                store.kind(*id).unwrap_or_default(),
                class
            ));
        }

        let clipboard = self.session.clipboard().clipboard();
        if !clipboard.is_empty() {
            out.push_str(&format!("({} node(s) on the clipboard)\n", clipboard.ids().len()));
        }
        out
    }
}

fn depth_of(store: &treeview_core::NodeStore, id: NodeId) -> usize {
    let mut depth = 0;
    let mut current = store.parent(id);
    while let Some(parent) = current {
        depth += 1;
        current = store.parent(parent);
    }
    depth
}

/// Prompt answered from a line-based input stream
///
/// A typed name renames, an empty line keeps the suggested value, `/skip`
/// skips and `/cancel` (or end of input) cancels.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, request: &PromptRequest) -> std::io::Result<Option<String>> {
        writeln!(self.output, "-- {} --", request.title)?;
        writeln!(self.output, "{}", request.message)?;
        write!(self.output, "[{}] (/skip, /cancel): ", request.current_value)?;
        self.output.flush()?;
        self.read_line()
    }

    /// Next line of input without its line ending; `None` at end of input
    ///
    /// Hosts read their commands through this too, so commands and prompt
    /// answers share one buffered stream.
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<R: BufRead, W: Write> ModalPrompt for LinePrompt<R, W> {
    fn request(&mut self, request: &PromptRequest) -> PromptResponse {
        match self.ask(request) {
            Ok(Some(answer)) => match answer.trim() {
                "/skip" => PromptResponse::Skip,
                "/cancel" => PromptResponse::Cancel,
                "" => PromptResponse::rename(request.current_value.clone()),
                name => PromptResponse::rename(name),
            },
            Ok(None) => PromptResponse::Cancel,
            Err(e) => {
                tracing::warn!("Prompt failed, cancelling: {}", e);
                PromptResponse::Cancel
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use treeview_core::surface::ScriptedPrompt;
    use treeview_core::{TreeConfig, TreeDocument};

    fn sample_shell(dir: &TempDir) -> Shell {
        let session = EditorSession::from_document(
            &TreeDocument::sample("01/01/2024 09:00:00"),
            TreeConfig::default(),
        );
        Shell::new(session, dir.path().join("tree.json"))
    }

    #[test]
    fn test_parse_commands() -> Result<()> {
        assert_eq!(Command::parse("   ")?, None);
        assert_eq!(
            Command::parse("ctrl 0_1")?,
            Some(Command::Click {
                label: "0_1".into(),
                toggle: true
            })
        );
        assert_eq!(
            Command::parse("drag 1 3")?,
            Some(Command::Drag { from: 1, to: 3 })
        );
        assert_eq!(Command::parse("paste")?, Some(Command::Key(KeyCommand::Paste)));
        assert!(Command::parse("click").is_err());
        assert!(Command::parse("drag 1 x").is_err());
        assert!(Command::parse("frobnicate").is_err());
        Ok(())
    }

    #[test]
    fn test_line_prompt_answers() {
        let request = PromptRequest::new("Name Conflict", "taken", "photo1.png");
        let mut prompt = LinePrompt::new(Cursor::new("new.png\n\n/skip\n/cancel\n"), Vec::new());

        assert_eq!(prompt.request(&request), PromptResponse::rename("new.png"));
        assert_eq!(prompt.request(&request), PromptResponse::rename("photo1.png"));
        assert_eq!(prompt.request(&request), PromptResponse::Skip);
        assert_eq!(prompt.request(&request), PromptResponse::Cancel);
        // End of input
        assert_eq!(prompt.request(&request), PromptResponse::Cancel);

        let shown = String::from_utf8(prompt.output).unwrap();
        assert!(shown.contains("-- Name Conflict --"));
        assert!(shown.contains("[photo1.png]"));
    }

    #[test]
    fn test_render_marks_focus_and_classes() -> Result<()> {
        let dir = TempDir::new()?;
        let mut shell = sample_shell(&dir);
        let mut prompt = ScriptedPrompt::silent();

        let Outcome::Output(text) = shell.run_line("click 0", &mut prompt)? else {
            panic!("click should not quit");
        };
        let first = text.lines().next().unwrap_or_default();
        assert!(first.starts_with('>'));
        assert!(first.contains("[-] Folder 0"));
        assert!(first.contains("odd selected"));
        assert!(text.contains("photo1.png"));
        Ok(())
    }

    #[test]
    fn test_copy_paste_through_conflict_prompt() -> Result<()> {
        let dir = TempDir::new()?;
        let mut shell = sample_shell(&dir);
        let mut prompt = LinePrompt::new(Cursor::new("photo1 copy.png\n"), Vec::new());
        let before = shell.session().store().len();

        for line in ["click 0_0", "copy", "focus 0", "paste"] {
            shell.run_line(line, &mut prompt)?;
        }

        assert_eq!(shell.session().store().len(), before + 1);
        let folder = shell.session().store().roots()[0];
        let names: Vec<&str> = shell
            .session()
            .store()
            .children(Some(folder))?
            .iter()
            .filter_map(|id| shell.session().store().text(*id))
            .collect();
        assert!(names.contains(&"photo1 copy.png"));
        Ok(())
    }

    #[test]
    fn test_quit_saves_and_abort_does_not() -> Result<()> {
        let dir = TempDir::new()?;
        let mut prompt = ScriptedPrompt::silent();

        let mut shell = sample_shell(&dir);
        assert_eq!(shell.run_line("abort", &mut prompt)?, Outcome::Quit);
        assert!(!dir.path().join("tree.json").exists());

        assert_eq!(shell.run_line("quit", &mut prompt)?, Outcome::Quit);
        assert!(dir.path().join("tree.json").exists());
        Ok(())
    }

    #[test]
    fn test_unknown_label_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        let mut shell = sample_shell(&dir);
        let mut prompt = ScriptedPrompt::silent();

        let err = shell.run_line("click 9_9", &mut prompt).unwrap_err();
        assert!(err.to_string().contains("No node labelled '9_9'"));
        Ok(())
    }
}
