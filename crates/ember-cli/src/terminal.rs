use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use ember_client::validation::ValidationState;
use ember_client::{DisplayedMessage, Frontend, RoomSummary, UserAction};
use ember_types::models::RoomName;

const HELP: &str = "Commands: /create <room> <ttl>, /join <room>, /leave, /rooms, /quit. \
Anything else is sent to the open room.";

/// What the session wants from the input reader while an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Prompt { secret: bool },
    Settled,
}

/// Line-oriented frontend on stdout.
///
/// Room lists are reprinted only when something besides the countdowns
/// changed; `/rooms` prints the latest one with current countdowns.
pub struct TerminalFrontend {
    turns: std_mpsc::Sender<Turn>,
    answers: std_mpsc::Receiver<String>,
    latest_rooms: Arc<Mutex<String>>,
    printed_shape: Vec<(RoomName, bool, bool, ValidationState, usize)>,
}

impl TerminalFrontend {
    /// Start the stdin reader and return the frontend fed by it. Closing
    /// stdin or `/quit` drops `actions`, which ends the session.
    pub fn spawn(actions: UnboundedSender<UserAction>) -> io::Result<Self> {
        let (answer_tx, answers) = std_mpsc::channel();
        let (turns, turn_rx) = std_mpsc::channel();
        let latest_rooms = Arc::new(Mutex::new(String::from("No rooms yet.")));

        let reader = InputReader {
            actions,
            answers: answer_tx,
            turns: turn_rx,
            latest_rooms: latest_rooms.clone(),
            conceal: io::stdin().is_terminal(),
        };
        thread::Builder::new()
            .name("ember-stdin".into())
            .spawn(move || reader.run(io::stdin().lock()))?;

        println!("{HELP}");
        Ok(Self {
            turns,
            answers,
            latest_rooms,
            printed_shape: Vec::new(),
        })
    }

    fn ask(&mut self, label: &str, secret: bool) -> Option<String> {
        print!("{label} ");
        let _ = io::stdout().flush();

        if self.turns.send(Turn::Prompt { secret }).is_err() {
            return None;
        }
        tokio::task::block_in_place(|| self.answers.recv()).ok()
    }
}

impl Frontend for TerminalFrontend {
    fn render_room_list(&mut self, rooms: &[RoomSummary]) {
        let listing = format_rooms(rooms);
        if let Ok(mut latest) = self.latest_rooms.lock() {
            *latest = listing.clone();
        }

        let shape: Vec<_> = rooms
            .iter()
            .map(|r| (r.name.clone(), r.active, r.joined, r.validation, r.unread))
            .collect();
        if shape != self.printed_shape {
            println!("{listing}");
            self.printed_shape = shape;
        }
    }

    fn render_active_room_messages(&mut self, room: Option<&RoomName>) {
        match room {
            Some(room) => println!("──── #{room} ────"),
            None => println!("──── no room selected ────"),
        }
    }

    fn display_message(&mut self, message: DisplayedMessage<'_>) {
        let marker = if message.is_own { " (you)" } else { "" };
        println!(
            "[{}] {}{}: {}",
            message.timestamp, message.sender, marker, message.body
        );
    }

    fn prompt_for_text(&mut self, label: &str) -> Option<String> {
        self.ask(label, false)
    }

    fn prompt_for_secret(&mut self, label: &str) -> Option<String> {
        self.ask(label, true)
    }

    fn notify_user(&mut self, message: &str) {
        println!("** {message}");
    }

    fn action_settled(&mut self) {
        let _ = self.turns.send(Turn::Settled);
    }
}

fn format_rooms(rooms: &[RoomSummary]) -> String {
    if rooms.is_empty() {
        return "No rooms yet.".to_string();
    }
    let mut out = String::from("Rooms:");
    for room in rooms {
        let focus = if room.active { '>' } else { ' ' };
        let lock = match room.validation {
            ValidationState::Validated => "🔓",
            _ => "🔒",
        };
        out.push_str(&format!("\n {focus} {lock} {}  {}", room.name, room.countdown));
        if room.unread > 0 {
            out.push_str(&format!("  ({} new)", room.unread));
        }
    }
    out
}

/// Owns stdin. Lines typed while an action is in flight go to that
/// action's prompts, in order; nothing is parsed as a command until the
/// session reports the action settled.
struct InputReader {
    actions: UnboundedSender<UserAction>,
    answers: std_mpsc::Sender<String>,
    turns: std_mpsc::Receiver<Turn>,
    latest_rooms: Arc<Mutex<String>>,
    /// Read secret answers from the terminal with echo off.
    conceal: bool,
}

impl InputReader {
    fn run<R: BufRead>(self, mut input: R) {
        let mut in_flight = false;
        loop {
            if in_flight {
                match self.turns.recv() {
                    Ok(Turn::Prompt { secret }) => {
                        let Some(answer) = self.read_answer(&mut input, secret) else {
                            break;
                        };
                        if self.answers.send(answer).is_err() {
                            break;
                        }
                    }
                    Ok(Turn::Settled) => in_flight = false,
                    Err(_) => break,
                }
                continue;
            }

            let Some(line) = next_line(&mut input) else {
                break;
            };
            match parse_command(&line) {
                Input::Action(action) => {
                    if self.actions.send(action).is_err() {
                        break;
                    }
                    in_flight = true;
                }
                Input::ShowRooms => {
                    if let Ok(latest) = self.latest_rooms.lock() {
                        println!("{latest}");
                    }
                }
                Input::Help(reason) => println!("{reason}\n{HELP}"),
                Input::Nothing => {}
                Input::Quit => break,
            }
        }
        debug!("Input reader finished");
    }

    fn read_answer<R: BufRead>(&self, input: &mut R, secret: bool) -> Option<String> {
        if secret && self.conceal {
            match rpassword::read_password() {
                Ok(answer) => return Some(answer),
                Err(e) => warn!("Hidden input unavailable, reading plainly: {}", e),
            }
        }
        next_line(input)
    }
}

/// One line without its terminator. `None` on end of input.
fn next_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => {
            let len = line.trim_end_matches(['\r', '\n']).len();
            line.truncate(len);
            Some(line)
        }
        Err(e) => {
            warn!("Failed to read stdin: {}", e);
            None
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Action(UserAction),
    ShowRooms,
    Help(&'static str),
    Nothing,
    Quit,
}

fn parse_command(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Nothing;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Action(UserAction::SendMessage(line.to_string()));
    };

    let (verb, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    let rest = rest.trim();
    match verb {
        "create" => match rest.rsplit_once(char::is_whitespace) {
            Some((name, ttl)) => Input::Action(UserAction::CreateRoom {
                name: name.trim().to_string(),
                ttl: ttl.to_string(),
            }),
            None => Input::Help("Usage: /create <room> <ttl seconds>"),
        },
        "join" if !rest.is_empty() => Input::Action(UserAction::JoinRoom(rest.to_string())),
        "join" => Input::Help("Usage: /join <room>"),
        "leave" => Input::Action(UserAction::LeaveRoom),
        "rooms" => Input::ShowRooms,
        "quit" | "exit" => Input::Quit,
        _ => Input::Help("Unknown command."),
    }
}
