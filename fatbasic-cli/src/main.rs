//! fatbasic shell - drive the file commands from a terminal.
//!
//! Usage:
//!   fatbasic                                 # empty volumes, interactive
//!   fatbasic -i 0=system.zip -i 1=data.zip   # install volume images
//!   fatbasic -c 'COPY "0:A.TXT", "1:A.TXT"'  # run one line and exit
//!
//! Commands: CD, PWD, KILL, MKDIR, COPY, RENAME. EXIT leaves the shell.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use fatbasic_core::{
    load_image_from_path, ArgStr, BasicError, BasicResult, FileBridge, FileCommand, HostClock,
    Interp, MemoryFatFs,
};

/// fatbasic file-command shell
#[derive(Parser, Debug)]
#[command(name = "fatbasic")]
#[command(about = "Run fatbasic file commands over in-memory volumes")]
struct Args {
    /// Volume images to install, as DRIVE=PATH (e.g. 0=system.zip)
    #[arg(short, long = "image", value_name = "DRIVE=PATH")]
    image: Vec<String>,

    /// Enable command tracing
    #[arg(short, long)]
    trace: bool,

    /// Run a single command line and exit
    #[arg(short = 'c', long, value_name = "LINE")]
    command: Option<String>,
}

/// One piece of a parsed command tail.
enum Item {
    Str(String),
    Ch(char),
}

/// Interpreter front-end over the tail of one typed command line.
struct LineInterp {
    items: VecDeque<Item>,
}

impl LineInterp {
    /// Split the text after the command keyword into string arguments
    /// (quoted or bare) and single-character tokens.
    fn parse(tail: &str) -> Self {
        let mut items = VecDeque::new();
        let mut chars = tail.chars().peekable();

        while let Some(&ch) = chars.peek() {
            match ch {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '"' => {
                    chars.next();
                    let mut text = String::new();
                    for c in chars.by_ref() {
                        if c == '"' {
                            break;
                        }
                        text.push(c);
                    }
                    items.push_back(Item::Str(text));
                }
                ',' => {
                    chars.next();
                    items.push_back(Item::Ch(','));
                }
                _ => {
                    let mut text = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || c == ',' {
                            break;
                        }
                        text.push(c);
                        chars.next();
                    }
                    items.push_back(Item::Str(text));
                }
            }
        }
        Self { items }
    }
}

impl Interp for LineInterp {
    fn eval_string(&mut self) -> BasicResult<ArgStr> {
        match self.items.pop_front() {
            Some(Item::Str(text)) => Ok(ArgStr::detached(text)),
            _ => Err(BasicError::Syntax),
        }
    }

    fn next_char(&mut self) -> Option<char> {
        match self.items.front() {
            Some(Item::Ch(_)) => match self.items.pop_front() {
                Some(Item::Ch(ch)) => Some(ch),
                _ => None,
            },
            _ => None,
        }
    }

    fn check_end(&mut self) -> BasicResult<()> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(BasicError::Syntax)
        }
    }

    fn print_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Outcome of one shell line.
enum LineResult {
    Continue,
    Exit,
}

fn run_line(line: &str, bridge: &FileBridge<HostClock>, fs: &mut MemoryFatFs) -> LineResult {
    let line = line.trim();
    if line.is_empty() {
        return LineResult::Continue;
    }

    let (keyword, tail) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    };

    if keyword.eq_ignore_ascii_case("EXIT") || keyword.eq_ignore_ascii_case("QUIT") {
        return LineResult::Exit;
    }

    match FileCommand::from_name(keyword) {
        Some(cmd) => {
            let mut interp = LineInterp::parse(tail);
            if let Err(e) = bridge.dispatch(cmd, &mut interp, fs) {
                println!("Error {}: {}", e.code(), e);
            }
        }
        None => {
            println!("Unknown command: {}", keyword);
        }
    }
    LineResult::Continue
}

/// Install `DRIVE=PATH` images into the driver.
fn install_images(specs: &[String], fs: &mut MemoryFatFs) -> Result<(), String> {
    for spec in specs {
        let (drive_part, path_part) = spec
            .split_once('=')
            .ok_or_else(|| format!("bad image spec (want DRIVE=PATH): {}", spec))?;
        let drive: u8 = drive_part
            .parse()
            .map_err(|_| format!("bad drive in image spec: {}", spec))?;
        let path = PathBuf::from(path_part);

        let image = load_image_from_path(&path)
            .map_err(|e| format!("failed to load {}: {}", path.display(), e))?;
        let count = image.files.len();
        fs.install_image(drive, &image)
            .map_err(|e| format!("cannot install {}: {}", path.display(), e))?;

        match &image.manifest.label {
            Some(label) => eprintln!("Installed {} ({} files) on {}:", label, count, drive),
            None => eprintln!("Installed {} files on {}:", count, drive),
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut fs = MemoryFatFs::new();
    install_images(&args.image, &mut fs)?;

    // The boot volume is mounted at startup; the rest mount on first access.
    fs.mount(0)?;

    let mut bridge = FileBridge::new(HostClock::new());
    bridge.trace = args.trace;

    if let Some(line) = &args.command {
        run_line(line, &bridge, &mut fs);
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if let LineResult::Exit = run_line(&line, &bridge, &mut fs) {
            break;
        }
    }
    Ok(())
}
