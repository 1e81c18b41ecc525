//! Target folder conflict resolution
//!
//! A small decision procedure: a free folder is used as-is, an occupied one
//! is updated, overwritten, or swapped for a sibling chosen by the user.
//! Nothing here touches the filesystem beyond the existence probe it is
//! given; acting on the decision is the generator's job.

use crate::cancellable::Cancellable;
use crate::error::{CoatError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound on "use a different folder" round trips
pub const MAX_FOLDER_ATTEMPTS: usize = 32;

/// What to do with the target folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderAction {
    /// Folder does not exist yet
    New,
    /// Erase the existing folder's contents and generate afresh
    Overwrite,
    /// Keep the existing project, refresh bundle data and metadata only
    Update,
}

impl fmt::Display for FolderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FolderAction::New => "new",
            FolderAction::Overwrite => "overwrite",
            FolderAction::Update => "update",
        };
        f.write_str(text)
    }
}

/// A decided folder and what to do with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTarget {
    pub action: FolderAction,
    pub folder: PathBuf,
}

/// The user's answer when the folder already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictChoice {
    Update,
    Overwrite,
    Redirect,
}

impl ConflictChoice {
    pub const ALL: [ConflictChoice; 3] = [
        ConflictChoice::Update,
        ConflictChoice::Overwrite,
        ConflictChoice::Redirect,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConflictChoice::Update => "Update Bundle Only",
            ConflictChoice::Overwrite => "Overwrite",
            ConflictChoice::Redirect => "Use Different Folder",
        }
    }
}

impl FromStr for ConflictChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "update" => Ok(ConflictChoice::Update),
            "overwrite" => Ok(ConflictChoice::Overwrite),
            "redirect" | "rename" => Ok(ConflictChoice::Redirect),
            _ => Err(format!(
                "unknown conflict choice '{}' (expected update, overwrite or redirect)",
                s
            )),
        }
    }
}

/// Questions the resolver asks when the folder is taken
pub trait FolderPrompter {
    /// How to handle an existing `folder`
    fn resolve_conflict(&mut self, folder: &Path) -> Result<Cancellable<ConflictChoice>>;

    /// Name of a sibling folder to use instead of `folder`
    fn redirect_folder_name(&mut self, folder: &Path) -> Result<Cancellable<String>>;
}

/// Decide where and how to generate, starting from `proposed`
pub fn resolve_folder<P, E>(
    proposed: PathBuf,
    prompter: &mut P,
    exists: E,
) -> Result<Cancellable<GenerationTarget>>
where
    P: FolderPrompter + ?Sized,
    E: Fn(&Path) -> bool,
{
    let mut folder = proposed;

    for _ in 0..MAX_FOLDER_ATTEMPTS {
        if !exists(&folder) {
            return Ok(Cancellable::Accepted(GenerationTarget {
                action: FolderAction::New,
                folder,
            }));
        }

        let choice = match prompter.resolve_conflict(&folder)? {
            Cancellable::Accepted(choice) => choice,
            Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
        };

        let action = match choice {
            ConflictChoice::Update => FolderAction::Update,
            ConflictChoice::Overwrite => FolderAction::Overwrite,
            ConflictChoice::Redirect => {
                let name = match prompter.redirect_folder_name(&folder)? {
                    Cancellable::Accepted(name) => name,
                    Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
                };
                let name = check_folder_name(&name)
                    .map_err(|message| CoatError::parse("folder name", message))?;
                folder = sibling(&folder, name);
                continue;
            }
        };

        return Ok(Cancellable::Accepted(GenerationTarget { action, folder }));
    }

    Err(CoatError::Redirects {
        attempts: MAX_FOLDER_ATTEMPTS,
    })
}

/// A redirect target must name a sibling folder, never a path
pub fn check_folder_name(name: &str) -> std::result::Result<&str, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Please enter a folder name".to_string());
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(format!("'{}' is not a plain folder name", name));
    }
    Ok(name)
}

fn sibling(folder: &Path, name: &str) -> PathBuf {
    match folder.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    #[derive(Default)]
    struct Script {
        choices: VecDeque<Cancellable<ConflictChoice>>,
        names: VecDeque<Cancellable<String>>,
        prompts: usize,
    }

    impl FolderPrompter for Script {
        fn resolve_conflict(&mut self, _folder: &Path) -> Result<Cancellable<ConflictChoice>> {
            self.prompts += 1;
            Ok(self.choices.pop_front().unwrap_or(Cancellable::Cancelled))
        }

        fn redirect_folder_name(&mut self, _folder: &Path) -> Result<Cancellable<String>> {
            self.prompts += 1;
            Ok(self.names.pop_front().unwrap_or(Cancellable::Cancelled))
        }
    }

    fn existing(paths: &[&str]) -> impl Fn(&Path) -> bool {
        let set: HashSet<PathBuf> = paths.iter().map(PathBuf::from).collect();
        move |p: &Path| set.contains(p)
    }

    #[test]
    fn test_missing_folder_is_new_without_prompting() {
        let mut script = Script::default();
        let outcome =
            resolve_folder(PathBuf::from("/out/hello"), &mut script, existing(&[])).unwrap();
        assert_eq!(
            outcome,
            Cancellable::Accepted(GenerationTarget {
                action: FolderAction::New,
                folder: PathBuf::from("/out/hello"),
            })
        );
        assert_eq!(script.prompts, 0);
    }

    #[test]
    fn test_update_and_overwrite_keep_folder() {
        for (choice, action) in [
            (ConflictChoice::Update, FolderAction::Update),
            (ConflictChoice::Overwrite, FolderAction::Overwrite),
        ] {
            let mut script = Script {
                choices: VecDeque::from([Cancellable::Accepted(choice)]),
                ..Default::default()
            };
            let outcome = resolve_folder(
                PathBuf::from("/out/hello"),
                &mut script,
                existing(&["/out/hello"]),
            )
            .unwrap();
            assert_eq!(
                outcome,
                Cancellable::Accepted(GenerationTarget {
                    action,
                    folder: PathBuf::from("/out/hello"),
                })
            );
        }
    }

    #[test]
    fn test_redirect_to_free_sibling() {
        let mut script = Script {
            choices: VecDeque::from([Cancellable::Accepted(ConflictChoice::Redirect)]),
            names: VecDeque::from([Cancellable::Accepted("hello2".to_string())]),
            ..Default::default()
        };
        let outcome = resolve_folder(
            PathBuf::from("/out/hello"),
            &mut script,
            existing(&["/out/hello"]),
        )
        .unwrap();
        assert_eq!(
            outcome,
            Cancellable::Accepted(GenerationTarget {
                action: FolderAction::New,
                folder: PathBuf::from("/out/hello2"),
            })
        );
    }

    #[test]
    fn test_redirect_into_another_conflict() {
        let mut script = Script {
            choices: VecDeque::from([
                Cancellable::Accepted(ConflictChoice::Redirect),
                Cancellable::Accepted(ConflictChoice::Update),
            ]),
            names: VecDeque::from([Cancellable::Accepted("hello2".to_string())]),
            ..Default::default()
        };
        let outcome = resolve_folder(
            PathBuf::from("/out/hello"),
            &mut script,
            existing(&["/out/hello", "/out/hello2"]),
        )
        .unwrap();
        assert_eq!(
            outcome,
            Cancellable::Accepted(GenerationTarget {
                action: FolderAction::Update,
                folder: PathBuf::from("/out/hello2"),
            })
        );
    }

    #[test]
    fn test_cancellation_at_any_prompt() {
        let mut at_choice = Script::default();
        assert!(resolve_folder(
            PathBuf::from("/out/hello"),
            &mut at_choice,
            existing(&["/out/hello"])
        )
        .unwrap()
        .is_cancelled());

        let mut at_name = Script {
            choices: VecDeque::from([Cancellable::Accepted(ConflictChoice::Redirect)]),
            ..Default::default()
        };
        assert!(resolve_folder(
            PathBuf::from("/out/hello"),
            &mut at_name,
            existing(&["/out/hello"])
        )
        .unwrap()
        .is_cancelled());
    }

    #[test]
    fn test_endless_redirects_are_bounded() {
        let mut script = Script {
            choices: (0..MAX_FOLDER_ATTEMPTS)
                .map(|_| Cancellable::Accepted(ConflictChoice::Redirect))
                .collect(),
            names: (0..MAX_FOLDER_ATTEMPTS)
                .map(|_| Cancellable::Accepted("hello".to_string()))
                .collect(),
            ..Default::default()
        };
        let err = resolve_folder(
            PathBuf::from("/out/hello"),
            &mut script,
            existing(&["/out/hello"]),
        )
        .unwrap_err();
        assert!(matches!(err, CoatError::Redirects { .. }));
    }

    #[test]
    fn test_redirect_rejects_paths() {
        for bad in ["/abs/path", "../x", "a/b", "a\\b", "..", ".", "  "] {
            let mut script = Script {
                choices: VecDeque::from([Cancellable::Accepted(ConflictChoice::Redirect)]),
                names: VecDeque::from([Cancellable::Accepted(bad.to_string())]),
                ..Default::default()
            };
            let err = resolve_folder(
                PathBuf::from("/out/hello"),
                &mut script,
                existing(&["/out/hello"]),
            )
            .unwrap_err();
            assert!(matches!(err, CoatError::Parse { .. }), "{:?}", bad);
        }
    }

    #[test]
    fn test_check_folder_name() {
        assert_eq!(check_folder_name(" hello2 "), Ok("hello2"));
        assert_eq!(check_folder_name("hello.v2"), Ok("hello.v2"));
        assert!(check_folder_name("").is_err());
        assert!(check_folder_name("x/..").is_err());
    }

    #[test]
    fn test_parse_conflict_choice() {
        assert_eq!("Update".parse::<ConflictChoice>(), Ok(ConflictChoice::Update));
        assert_eq!("rename".parse::<ConflictChoice>(), Ok(ConflictChoice::Redirect));
        assert!("delete".parse::<ConflictChoice>().is_err());
    }
}
