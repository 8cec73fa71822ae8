// Wayfinder Interactive Console
// Chat-style REPL: describes the scene and reacts to navigation phrases

use crate::session::GroundingSession;
use anyhow::Result;
use nalgebra::Point3;
use std::io::{self, BufRead, BufReader, Write};
use tokio::sync::mpsc;
use wayfinder_eye::{summarize, NavigationController, SceneContext, SnapshotSubscription};

pub struct InteractiveConsole {
    session: GroundingSession,
    scene: SceneContext,
    subscription: SnapshotSubscription,
    controller: NavigationController<mpsc::UnboundedSender<Point3<f32>>>,
    targets: mpsc::UnboundedReceiver<Point3<f32>>,
    history: Vec<String>,
}

enum CommandResult {
    Continue,
    Exit,
    Output(String),
    Error(String),
}

impl InteractiveConsole {
    pub fn new(session: GroundingSession) -> Self {
        let (tx, targets) = mpsc::unbounded_channel();
        let controller = session.pipeline.navigation_controller(tx);
        let subscription = session.pipeline.subscribe();

        Self {
            session,
            scene: SceneContext::new(),
            subscription,
            controller,
            targets,
            history: Vec::new(),
        }
    }

    /// Start the interactive console
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();
        self.print_help();

        // Ground the frame once up front so there is something to ask about.
        if let CommandResult::Error(msg) = self.refresh().await {
            println!("❌ Error: {}", msg);
        }

        let stdin = io::stdin();
        let mut stdin = BufReader::new(stdin.lock());

        loop {
            print!("wayfinder> ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }

            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            self.history.push(line.clone());

            match self.handle_command(&line).await {
                CommandResult::Continue => continue,
                CommandResult::Exit => break,
                CommandResult::Output(output) => println!("{}", output),
                CommandResult::Error(msg) => println!("❌ Error: {}", msg),
            }
        }

        println!("\n👋 Goodbye!");
        Ok(())
    }

    fn print_banner(&self) {
        println!("\n╔═══════════════════════════════════════════════════╗");
        println!("║             Wayfinder Interactive Console         ║");
        println!("╚═══════════════════════════════════════════════════╝");
        println!();
        println!("Type 'help' for available commands, 'exit' to quit");
        println!();
    }

    fn print_help(&self) {
        println!("📚 Available Commands:");
        println!("  help, ?           - Show this help message");
        println!("  exit, quit, q     - Exit the console");
        println!("  frame             - Run another grounding cycle");
        println!("  context           - Show the scene context");
        println!("  summary           - Show grouped detections with positions");
        println!("  history           - Show message history");
        println!("  <message>         - Chat; navigation phrases trigger a target");
        println!();
        println!("💡 Examples:");
        println!("  guide me to the red car");
        println!("  take me to chair");
        println!();
    }

    async fn handle_command(&mut self, line: &str) -> CommandResult {
        match line.to_lowercase().as_str() {
            "help" | "?" => {
                self.print_help();
                CommandResult::Continue
            }
            "exit" | "quit" | "q" => CommandResult::Exit,
            "frame" => self.refresh().await,
            "context" => CommandResult::Output(self.scene.context()),
            "summary" => CommandResult::Output(summarize(&self.session.pipeline.latest())),
            "history" => CommandResult::Output(
                self.history
                    .iter()
                    .enumerate()
                    .map(|(i, h)| format!("{:>3}  {}", i + 1, h))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => self.chat(line),
        }
    }

    /// Run a cycle and fold the published snapshot into the scene context.
    async fn refresh(&mut self) -> CommandResult {
        if let Err(e) = self.session.cycle() {
            return CommandResult::Error(format!("{:#}", e));
        }
        match self.subscription.next().await {
            Some(snapshot) => {
                self.scene.update(&snapshot);
                CommandResult::Output(format!("Frame {}: {}", snapshot.frame_id, self.scene.context()))
            }
            None => CommandResult::Error("snapshot stream closed".to_string()),
        }
    }

    fn chat(&mut self, message: &str) -> CommandResult {
        match self.controller.handle_message(message) {
            Ok(Some(_)) => match self.targets.try_recv() {
                Ok(target) => CommandResult::Output(format!(
                    "✅ Navigating to ({:.2}, {:.2}, {:.2})",
                    target.x, target.y, target.z
                )),
                Err(_) => CommandResult::Error("navigation target was not delivered".to_string()),
            },
            Ok(None) if self.scene.is_ready() => {
                CommandResult::Output(format!("I can see {}.", self.scene.context()))
            }
            Ok(None) => CommandResult::Output("I don't see anything yet.".to_string()),
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}
