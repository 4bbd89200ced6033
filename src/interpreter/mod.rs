//! The interpreter: variable/program state, the run loop, and the
//! `EvalContext` glue that lets `crate::expr` call back into it
//! (spec §4.D, §4.E, §4.G, §5).

pub mod control;
pub mod render;
pub mod softswitch;

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{fold_address, DEFAULT_FRE, HIMEM_HI, HIMEM_LO, LOMEM_HI, LOMEM_LO, POLL_INTERVAL};
use crate::error::{ErrorKind, RuntimeError};
use crate::expr::{self, EvalContext, Expr};
use crate::lexer;
use crate::memory::Memory;
use crate::program::Program;
use crate::statements::{self, HplotForm, IfThen, LValue, PrintItem, Statement};
use crate::value::{Name, Value};
use crate::variables::{ArrayStore, ScalarStore};

use control::{ControlState, ForFrame, Pc};
use render::{bresenham_line, GraphicsState, Mode, Renderer};
use softswitch::KeyboardLatch;

/// Supplies `INPUT`/`GET` with a line or character, subject to a
/// timeout (spec §4.G). `dialect-cli` backs this with a reader thread
/// over real stdin; tests back it with a canned queue.
pub trait InputSource {
    fn read_line(&mut self, timeout: Duration) -> Result<String, ErrorKind>;
    fn read_char(&mut self, timeout: Duration) -> Result<u8, ErrorKind>;
}

/// An `InputSource` fed from a fixed queue, for tests and non-interactive runs.
#[derive(Default)]
pub struct QueueInput {
    lines: std::collections::VecDeque<String>,
}

impl QueueInput {
    pub fn new(lines: Vec<String>) -> Self {
        QueueInput {
            lines: lines.into(),
        }
    }
}

impl InputSource for QueueInput {
    fn read_line(&mut self, _timeout: Duration) -> Result<String, ErrorKind> {
        self.lines.pop_front().ok_or(ErrorKind::InputTimeout)
    }
    fn read_char(&mut self, _timeout: Duration) -> Result<u8, ErrorKind> {
        let line = self.lines.front_mut().ok_or(ErrorKind::InputTimeout)?;
        if line.is_empty() {
            self.lines.pop_front();
            Ok(b'\n')
        } else {
            Ok(line.remove(0) as u8)
        }
    }
}

/// What the run loop does after one statement part finishes.
enum Flow {
    Continue,
    Jump(Pc),
    /// `END`/`STOP`: halts with a resumable line number (`CONT`).
    Halt,
    /// Falling off the end of the program (including an `IF` whose
    /// false branch has no next line to advance to).
    End,
}

/// Outcome of [`Interpreter::run`], for a host to report.
pub enum RunOutcome {
    Ended,
    Stopped(u32),
    UncaughtError(String),
    Timeout,
    Cancelled,
}

pub struct Interpreter {
    pub memory: Memory,
    pub scalars: ScalarStore,
    pub arrays: ArrayStore,
    pub program: Program,
    pub gfx: GraphicsState,
    fns: HashMap<Name, (Name, Expr)>,
    data_items: Vec<Vec<u8>>,
    control: ControlState,
    onerr_line: Option<u32>,
    last_error: Option<RuntimeError>,
    last_executed_line: Option<u32>,
    keyboard: KeyboardLatch,
    rng: StdRng,
    last_rnd: f64,
    renderer: Box<dyn Renderer>,
    input: Box<dyn InputSource>,
    out: Box<dyn Write>,
    column: usize,
    cancel: Arc<AtomicBool>,
    pub input_timeout: Duration,
    pub exec_timeout: Option<Duration>,
    pub statement_delay: Option<Duration>,
    trace: bool,
}

impl Interpreter {
    pub fn new(renderer: Box<dyn Renderer>, input: Box<dyn InputSource>, out: Box<dyn Write>) -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        let mut memory = Memory::new();
        memory.poke_u16(LOMEM_LO.min(LOMEM_HI), 0x0800);
        memory.poke_u16(HIMEM_LO.min(HIMEM_HI), 0x9600);
        Interpreter {
            memory,
            scalars: ScalarStore::new(),
            arrays: ArrayStore::new(),
            program: Program::new(),
            gfx: GraphicsState::new(),
            fns: HashMap::new(),
            data_items: Vec::new(),
            control: ControlState::new(),
            onerr_line: None,
            last_error: None,
            last_executed_line: None,
            keyboard: KeyboardLatch::default(),
            rng: StdRng::seed_from_u64(seed),
            last_rnd: 0.0,
            renderer,
            input,
            out,
            column: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            input_timeout: Duration::from_secs(30),
            exec_timeout: None,
            statement_delay: None,
            trace: false,
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn press_key(&mut self, ch: u8) {
        self.keyboard.press(ch);
    }

    /// Loads a program file's text (spec §6): one logical line per
    /// physical line, `//`-prefixed lines are host comments and are
    /// skipped, a line number with empty trailing text deletes that
    /// line.
    pub fn load_program(&mut self, text: &str) -> Result<(), ErrorKind> {
        for raw_line in text.lines() {
            if raw_line.trim_start().starts_with("//") {
                continue;
            }
            if raw_line.trim().is_empty() {
                continue;
            }
            self.enter_line(raw_line)?;
        }
        Ok(())
    }

    /// Enters one line of program text, as the REPL does for each line
    /// the user types with a leading line number.
    pub fn enter_line(&mut self, raw_line: &str) -> Result<(), ErrorKind> {
        let trimmed = raw_line.trim_start();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(ErrorKind::Syntax);
        }
        let number: u32 = digits.parse().map_err(|_| ErrorKind::Syntax)?;
        let rest = trimmed[digits.len()..].trim_start();
        self.program.set_line(number, rest.to_string());
        Ok(())
    }

    /// `NEW` (spec §3): clears the program store along with every piece
    /// of state `RUN` clears, so a fresh program starts from nothing.
    pub fn new_program(&mut self) {
        self.program.clear();
        self.scalars.clear();
        self.arrays.clear();
        self.fns.clear();
        self.control = ControlState::new();
        self.data_items.clear();
        self.onerr_line = None;
        self.last_error = None;
        self.last_executed_line = None;
    }

    /// `LIST`: formats lines in `range` (inclusive; `None` bounds are
    /// open) as they'd be redisplayed.
    pub fn list(&self, lo: Option<u32>, hi: Option<u32>) -> String {
        let mut out = String::new();
        for (n, text) in self.program.iter() {
            if lo.is_some_and(|l| n < l) || hi.is_some_and(|h| n > h) {
                continue;
            }
            out.push_str(&format!("{} {}\n", n, text));
        }
        out
    }

    fn collect_data(&mut self) {
        self.data_items.clear();
        for (_, text) in self.program.iter() {
            for part in lexer::split_statements(text) {
                let parsed = statements::parse_statement(&part);
                if let Ok(Statement::Data(raw)) = parsed {
                    self.data_items.extend(split_data_items(&raw));
                }
            }
        }
    }

    pub fn run(&mut self) -> RunOutcome {
        let first = match self.program.first_line() {
            Some(n) => n,
            None => return RunOutcome::Ended,
        };
        self.scalars.clear();
        self.arrays.clear();
        self.control = ControlState::new();
        self.fns.clear();
        self.last_error = None;
        self.collect_data();

        let mut pc = (first, 0);
        let start = Instant::now();
        let mut poll_counter: u64 = 0;

        loop {
            poll_counter += 1;
            if poll_counter % POLL_INTERVAL == 0 {
                if self.cancel.load(Ordering::Relaxed) {
                    return RunOutcome::Cancelled;
                }
                if let Some(limit) = self.exec_timeout {
                    if start.elapsed() > limit {
                        return RunOutcome::Timeout;
                    }
                }
            }

            let text = match self.program.get_line(pc.0).map(str::to_string) {
                Some(t) => t,
                None => {
                    return RunOutcome::UncaughtError(
                        RuntimeError::new(ErrorKind::UndefinedStatement, pc.0).diagnostic(),
                    )
                }
            };
            let parts = lexer::split_statements(&text);
            if pc.1 >= parts.len() {
                match self.program.next_line(pc.0) {
                    Some(next) => {
                        pc = (next, 0);
                        continue;
                    }
                    None => return RunOutcome::Ended,
                }
            }

            if self.trace && pc.1 == 0 {
                let _ = write!(self.out, "\n#{}", pc.0);
            }

            let flow = match self.try_fast_for_next(&parts[pc.1], pc, &parts) {
                Some(flow) => flow,
                None => match statements::parse_statement(&parts[pc.1]) {
                    Ok(stmt) => match self.exec_statement(&stmt, pc) {
                        Ok(flow) => flow,
                        Err(kind) => match self.trap(kind, pc.0) {
                            Some(target) => Flow::Jump(target),
                            None => {
                                return RunOutcome::UncaughtError(
                                    RuntimeError::new(kind, pc.0).diagnostic(),
                                )
                            }
                        },
                    },
                    Err(kind) => match self.trap(kind, pc.0) {
                        Some(target) => Flow::Jump(target),
                        None => {
                            return RunOutcome::UncaughtError(
                                RuntimeError::new(kind, pc.0).diagnostic(),
                            )
                        }
                    },
                },
            };

            self.last_executed_line = Some(pc.0);

            match flow {
                Flow::Continue => {
                    pc = (pc.0, pc.1 + 1);
                }
                Flow::Jump(next) => {
                    pc = next;
                }
                Flow::Halt => {
                    return RunOutcome::Stopped(pc.0);
                }
                Flow::End => {
                    return RunOutcome::Ended;
                }
            }

            if let Some(delay) = self.statement_delay {
                std::thread::sleep(delay);
            }
        }
    }

    /// Records a trapped error and returns the handler's entry point,
    /// or `None` if no handler is armed (spec §4.H, §7).
    fn trap(&mut self, kind: ErrorKind, line: u32) -> Option<Pc> {
        let target = self.onerr_line?;
        self.memory
            .poke_u16(crate::constants::ERR_LINE_LO.min(crate::constants::ERR_LINE_HI), line as u16);
        self.memory.poke(crate::constants::ERR_CODE, kind.code());
        self.last_error = Some(RuntimeError::new(kind, line));
        Some((target, 0))
    }

    /// Tight-loop fast path (spec §4.G): when a `NEXT` resumes a `FOR`
    /// whose entire body is the gap between two adjacent lines with no
    /// other statements, inline the countdown instead of single-stepping.
    /// Returns `None` whenever the fast path doesn't apply, so the
    /// normal parse-and-execute path runs unchanged.
    fn try_fast_for_next(&mut self, part: &str, pc: Pc, parts: &[String]) -> Option<Flow> {
        if parts.len() != 1 {
            return None;
        }
        let trimmed = part.trim();
        // Only a bare `NEXT` (no loop variable) is eligible: a named
        // `NEXT v` might not name the innermost frame, and resolving
        // that correctly needs the full `find_for` path.
        if !trimmed.eq_ignore_ascii_case("NEXT") {
            return None;
        }
        let frame_idx = self.control.for_stack.len().checked_sub(1)?;
        let frame = self.control.for_stack.get(frame_idx)?.clone();
        // Eligible only when the `FOR`'s own line is nothing but the `FOR`
        // clause: `resume` points one part past the `FOR` itself, so
        // `resume.1 == 1` means it was the line's first statement, and
        // splitting that line must yield exactly one part so it's also
        // the last, otherwise a trailing statement (e.g. `FOR I=1 TO 3:
        // PRINT I`) would be silently skipped on every fast-path pass.
        if frame.resume.1 != 1 {
            return None;
        }
        let for_line_text = self.program.get_line(frame.resume.0)?;
        if lexer::split_statements(for_line_text).len() != 1 {
            return None;
        }
        if self.program.next_line(frame.resume.0) != Some(pc.0) {
            return None;
        }
        if frame.step == 0.0 {
            // A zero step never finishes; fall back to the normal path so
            // the run loop's own cancellation/timeout poll still applies.
            return None;
        }
        let mut current = self.scalars.get(&frame.var).as_number()?;
        loop {
            current += frame.step;
            if frame.finished(current) {
                self.scalars.set(frame.var.clone(), Value::number(current)).ok()?;
                self.control.for_stack.pop();
                break;
            }
        }
        log::debug!("tight-loop fast path collapsed FOR {}", frame.var);
        self.scalars.set(frame.var.clone(), Value::number(current)).ok()?;
        Some(Flow::Continue)
    }

    fn exec_statement(&mut self, stmt: &Statement, pc: Pc) -> Result<Flow, ErrorKind> {
        use Statement::*;
        match stmt {
            Let { target, value } => {
                let v = expr::eval(value, self)?;
                self.assign(target, v)?;
                Ok(Flow::Continue)
            }
            Print(items) => {
                self.exec_print(items)?;
                Ok(Flow::Continue)
            }
            Goto(target) => {
                let n = self.eval_line_number(target)?;
                self.require_line(n)?;
                Ok(Flow::Jump((n, 0)))
            }
            Gosub(target) => {
                let n = self.eval_line_number(target)?;
                self.require_line(n)?;
                self.control.push_gosub((pc.0, pc.1 + 1))?;
                Ok(Flow::Jump((n, 0)))
            }
            Return => {
                let target = self
                    .control
                    .gosub_stack
                    .pop()
                    .ok_or(ErrorKind::ReturnWithoutGosub)?;
                Ok(Flow::Jump(target))
            }
            If { cond, then_branch } => {
                let c = expr::eval(cond, self)?;
                if c.truthy() {
                    match then_branch {
                        IfThen::Goto(n) => {
                            self.require_line(*n)?;
                            Ok(Flow::Jump((*n, 0)))
                        }
                        IfThen::Statement(inner) => self.exec_statement(inner, pc),
                    }
                } else {
                    match self.program.next_line(pc.0) {
                        Some(next) => Ok(Flow::Jump((next, 0))),
                        None => Ok(Flow::End),
                    }
                }
            }
            For { var, from, to, step } => {
                let start_v = expr::eval(from, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                let limit = expr::eval(to, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                let step_v = match step {
                    Some(e) => expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?,
                    None => 1.0,
                };
                self.scalars.set(var.clone(), Value::number(start_v))?;
                self.control.push_for(ForFrame {
                    var: var.clone(),
                    limit,
                    step: step_v,
                    resume: (pc.0, pc.1 + 1),
                })?;
                Ok(Flow::Continue)
            }
            Next(names) => self.exec_next(names),
            Input { prompt, vars } => {
                self.exec_input(prompt.as_deref(), vars)?;
                Ok(Flow::Continue)
            }
            Get(target) => {
                let ch = self.input.read_char(self.input_timeout)?;
                self.assign(target, Value::string(vec![ch]))?;
                Ok(Flow::Continue)
            }
            Read(targets) => {
                for t in targets {
                    let is_string = lvalue_is_string(t);
                    let raw = self
                        .data_items
                        .get(self.control.data_cursor)
                        .ok_or(ErrorKind::OutOfData)?
                        .clone();
                    self.control.data_cursor += 1;
                    let v = coerce_text(&raw, is_string)?;
                    self.assign(t, v)?;
                }
                Ok(Flow::Continue)
            }
            Data(_) => Ok(Flow::Continue),
            Restore => {
                self.control.data_cursor = 0;
                Ok(Flow::Continue)
            }
            Dim(decls) => {
                for (name, bound_exprs) in decls {
                    let mut bounds = Vec::with_capacity(bound_exprs.len());
                    for e in bound_exprs {
                        let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                        if n < 0.0 {
                            return Err(ErrorKind::IllegalQuantity);
                        }
                        bounds.push(n.trunc() as u16);
                    }
                    self.arrays.dim(name.clone(), &bounds)?;
                }
                Ok(Flow::Continue)
            }
            On { selector, is_gosub, targets } => {
                let n = expr::eval(selector, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                let idx = n.trunc() as i64;
                if idx < 1 || idx as usize > targets.len() {
                    return Ok(Flow::Continue);
                }
                let line = self.eval_line_number(&targets[idx as usize - 1])?;
                self.require_line(line)?;
                if *is_gosub {
                    self.control.push_gosub((pc.0, pc.1 + 1))?;
                }
                Ok(Flow::Jump((line, 0)))
            }
            DefFn { name, param, body } => {
                self.fns.insert(name.clone(), (param.clone(), body.clone()));
                Ok(Flow::Continue)
            }
            OnErrGoto(target) => {
                let n = self.eval_line_number(target)?;
                self.onerr_line = Some(n);
                self.memory.poke(crate::constants::ONERR_FLAG, 1);
                Ok(Flow::Continue)
            }
            Resume => {
                let err = self.last_error.take().ok_or(ErrorKind::CantResume)?;
                Ok(Flow::Jump((err.line, 0)))
            }
            Poke(addr, val) => {
                let a = fold_address(expr::eval(addr, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32);
                let v = expr::eval(val, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as u8;
                softswitch::poke(&mut self.memory, &mut self.gfx, a, v);
                Ok(Flow::Continue)
            }
            Call(addr) => {
                let a = expr::eval(addr, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                log::debug!("CALL {a} (no ROM routine emulated)");
                Ok(Flow::Continue)
            }
            HimemSet(e) => {
                let v = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as u16;
                self.memory.poke_u16(HIMEM_LO.min(HIMEM_HI), v);
                Ok(Flow::Continue)
            }
            LomemSet(e) => {
                let v = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as u16;
                self.memory.poke_u16(LOMEM_LO.min(LOMEM_HI), v);
                Ok(Flow::Continue)
            }
            Home => {
                self.renderer.clear_text();
                self.gfx.cursor_x = 0;
                self.gfx.cursor_y = 0;
                self.column = 0;
                Ok(Flow::Continue)
            }
            TextMode => {
                self.gfx.mode = Mode::Text;
                Ok(Flow::Continue)
            }
            Gr => {
                self.gfx.mode = Mode::Gr;
                Ok(Flow::Continue)
            }
            Hgr => {
                self.gfx.mode = Mode::Hgr;
                Ok(Flow::Continue)
            }
            Hgr2 => {
                self.gfx.mode = Mode::Hgr2;
                Ok(Flow::Continue)
            }
            ColorEq(e) => {
                let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                self.gfx.lores_color = (n as i64).rem_euclid(16) as u8;
                Ok(Flow::Continue)
            }
            HcolorEq(e) => {
                let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                self.gfx.hires_color = (n as i64).rem_euclid(8) as u8;
                Ok(Flow::Continue)
            }
            Plot(xe, ye) => {
                let x = expr::eval(xe, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y = expr::eval(ye, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                self.renderer.plot(x, y, self.gfx.lores_color);
                Ok(Flow::Continue)
            }
            Hlin(x1e, x2e, ye) => {
                let x1 = expr::eval(x1e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let x2 = expr::eval(x2e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y = expr::eval(ye, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let (lo, hi) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
                for x in lo..=hi {
                    self.renderer.plot(x, y, self.gfx.lores_color);
                }
                Ok(Flow::Continue)
            }
            Vlin(y1e, y2e, xe) => {
                let y1 = expr::eval(y1e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y2 = expr::eval(y2e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let x = expr::eval(xe, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let (lo, hi) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
                for y in lo..=hi {
                    self.renderer.plot(x, y, self.gfx.lores_color);
                }
                Ok(Flow::Continue)
            }
            Hplot(form) => {
                self.exec_hplot(form)?;
                Ok(Flow::Continue)
            }
            Htab(e) => {
                let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                self.gfx.cursor_x = (n as i64 - 1).max(0) as u8;
                self.column = self.gfx.cursor_x as usize;
                Ok(Flow::Continue)
            }
            Vtab(e) => {
                let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                self.gfx.cursor_y = (n as i64 - 1).max(0) as u8;
                Ok(Flow::Continue)
            }
            Inverse => {
                self.gfx.inverse = true;
                self.gfx.flash = false;
                Ok(Flow::Continue)
            }
            NormalMode => {
                self.gfx.inverse = false;
                self.gfx.flash = false;
                Ok(Flow::Continue)
            }
            Flash => {
                self.gfx.flash = true;
                self.gfx.inverse = false;
                Ok(Flow::Continue)
            }
            Draw(shape, at) | XDraw(shape, at) => {
                let n = expr::eval(shape, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                if let Some((xe, ye)) = at {
                    let x = expr::eval(xe, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                    let y = expr::eval(ye, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                    log::trace!("DRAW shape {n} at ({x},{y}) (no shape table loaded)");
                } else {
                    log::trace!("DRAW shape {n} at last point (no shape table loaded)");
                }
                Ok(Flow::Continue)
            }
            ScaleEq(e) => {
                self.gfx.scale = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                Ok(Flow::Continue)
            }
            RotEq(e) => {
                self.gfx.rotation = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                Ok(Flow::Continue)
            }
            End => Ok(Flow::End),
            Stop => Ok(Flow::Halt),
            Cont => {
                let line = self.last_executed_line.ok_or(ErrorKind::CantContinue)?;
                let next = self.program.next_line(line).ok_or(ErrorKind::CantContinue)?;
                Ok(Flow::Jump((next, 0)))
            }
            Trace => {
                self.trace = true;
                Ok(Flow::Continue)
            }
            Notrace => {
                self.trace = false;
                Ok(Flow::Continue)
            }
            Rem(_) => Ok(Flow::Continue),
            HostNoOp(kw, rest) => {
                log::info!("{kw} {rest} (host no-op)");
                Ok(Flow::Continue)
            }
        }
    }

    fn exec_next(&mut self, names: &[Name]) -> Result<Flow, ErrorKind> {
        let wanted = names.first();
        let idx = self
            .control
            .find_for(wanted)
            .ok_or(ErrorKind::NextWithoutFor)?;
        self.control.for_stack.truncate(idx + 1);
        let frame = self.control.for_stack[idx].clone();
        let current = self
            .scalars
            .get(&frame.var)
            .as_number()
            .ok_or(ErrorKind::TypeMismatch)?
            + frame.step;
        self.scalars.set(frame.var.clone(), Value::number(current))?;
        if frame.finished(current) {
            self.control.for_stack.pop();
            Ok(Flow::Continue)
        } else {
            Ok(Flow::Jump(frame.resume))
        }
    }

    fn exec_hplot(&mut self, form: &HplotForm) -> Result<(), ErrorKind> {
        match form {
            HplotForm::Point(xe, ye) => {
                let x = expr::eval(xe, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y = expr::eval(ye, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let color = self.gfx.hires_color;
                self.renderer.plot(x, y, color);
                self.gfx.last_point = (x, y);
                self.gfx.last_plot_color = color;
            }
            HplotForm::Line(x1e, y1e, x2e, y2e) => {
                let x1 = expr::eval(x1e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y1 = expr::eval(y1e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let x2 = expr::eval(x2e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y2 = expr::eval(y2e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let color = self.gfx.hires_color;
                for (px, py) in bresenham_line(x1, y1, x2, y2) {
                    self.renderer.plot(px, py, color);
                }
                self.gfx.last_point = (x2, y2);
                self.gfx.last_plot_color = color;
            }
            HplotForm::LineFromLast(x2e, y2e) => {
                let x2 = expr::eval(x2e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let y2 = expr::eval(y2e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)? as i32;
                let (x1, y1) = self.gfx.last_point;
                let color = self.gfx.last_plot_color;
                for (px, py) in bresenham_line(x1, y1, x2, y2) {
                    self.renderer.plot(px, py, color);
                }
                self.gfx.last_point = (x2, y2);
            }
        }
        Ok(())
    }

    fn exec_print(&mut self, items: &[PrintItem]) -> Result<(), ErrorKind> {
        let mut suppress_newline = false;
        for item in items {
            suppress_newline = matches!(item, PrintItem::Comma | PrintItem::Semicolon);
            match item {
                PrintItem::Value(e) => {
                    let v = expr::eval(e, self)?;
                    self.write_text(&v.display());
                }
                PrintItem::Tab(e) => {
                    let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                    let target = (n as i64 - 1).max(0) as usize;
                    if target > self.column {
                        self.write_text(&" ".repeat(target - self.column));
                    }
                }
                PrintItem::Spc(e) => {
                    let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                    self.write_text(&" ".repeat(n.max(0.0) as usize));
                }
                PrintItem::Semicolon => {}
                PrintItem::Comma => {
                    let next_zone = (self.column / 10 + 1) * 10;
                    self.write_text(&" ".repeat(next_zone - self.column));
                }
            }
        }
        if !suppress_newline {
            let _ = writeln!(self.out);
            self.column = 0;
        }
        Ok(())
    }

    fn write_text(&mut self, s: &str) {
        let _ = write!(self.out, "{s}");
        for &b in s.as_bytes() {
            self.renderer.put_char(b);
            if b == b'\n' {
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    fn exec_input(&mut self, prompt: Option<&[u8]>, vars: &[LValue]) -> Result<(), ErrorKind> {
        if let Some(p) = prompt {
            self.write_text(&String::from_utf8_lossy(p));
        }
        self.write_text("? ");
        let line = self.input.read_line(self.input_timeout)?;
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < vars.len() {
            return Err(ErrorKind::Syntax);
        }
        for (target, text) in vars.iter().zip(parts) {
            let is_string = lvalue_is_string(target);
            let v = coerce_text(text.trim().as_bytes(), is_string)?;
            self.assign(target, v)?;
        }
        Ok(())
    }

    fn assign(&mut self, target: &LValue, value: Value) -> Result<(), ErrorKind> {
        match target {
            LValue::Scalar(name) => self.scalars.set(name.clone(), value),
            LValue::Array(name, idx_exprs) => {
                let mut idx = Vec::with_capacity(idx_exprs.len());
                for e in idx_exprs {
                    let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
                    if n < 0.0 {
                        return Err(ErrorKind::BadSubscript);
                    }
                    idx.push(n.trunc() as usize);
                }
                self.arrays.set(name, &idx, value)
            }
        }
    }

    fn eval_line_number(&mut self, e: &Expr) -> Result<u32, ErrorKind> {
        let n = expr::eval(e, self)?.as_number().ok_or(ErrorKind::TypeMismatch)?;
        if n < 0.0 {
            return Err(ErrorKind::IllegalQuantity);
        }
        Ok(n.trunc() as u32)
    }

    fn require_line(&self, n: u32) -> Result<(), ErrorKind> {
        if self.program.get_line(n).is_some() {
            Ok(())
        } else {
            Err(ErrorKind::UndefinedStatement)
        }
    }
}

fn lvalue_is_string(lv: &LValue) -> bool {
    match lv {
        LValue::Scalar(n) => n.is_string(),
        LValue::Array(n, _) => n.is_string(),
    }
}

/// Coerces input/DATA text to a variable's type: verbatim for a string
/// target, a strict (non-prefix) numeric parse for a numeric one.
fn coerce_text(raw: &[u8], is_string: bool) -> Result<Value, ErrorKind> {
    if is_string {
        Ok(Value::string(raw.to_vec()))
    } else {
        let text = String::from_utf8_lossy(raw);
        text.trim()
            .parse::<f64>()
            .map(Value::number)
            .map_err(|_| ErrorKind::TypeMismatch)
    }
}

/// Splits a `DATA` statement's raw trailing text on top-level commas,
/// stripping one layer of surrounding quotes from any quoted item
/// (spec §4.D: items are extracted once at `RUN` time).
fn split_data_items(raw: &str) -> Vec<Vec<u8>> {
    let chars: Vec<char> = raw.chars().collect();
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(unquote(&chars[start..i]));
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    items.push(unquote(&chars[start..]));
    items
}

fn unquote(chars: &[char]) -> Vec<u8> {
    let s: String = chars.iter().collect();
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    inner.as_bytes().to_vec()
}

impl EvalContext for Interpreter {
    fn get_scalar(&self, name: &Name) -> Value {
        self.scalars.get(name)
    }

    fn get_array(&mut self, name: &Name, indices: &[usize]) -> Result<Value, ErrorKind> {
        self.arrays.get(name, indices)
    }

    fn peek_dynamic(&mut self, address: u16) -> u8 {
        softswitch::peek(&self.memory, &self.gfx, &mut self.keyboard, address)
    }

    fn pos(&self) -> usize {
        self.column
    }

    fn fre(&self) -> f64 {
        DEFAULT_FRE
    }

    fn scrn(&self, x: i32, y: i32) -> i32 {
        let _ = (x, y);
        self.gfx.lores_color as i32
    }

    fn rnd(&mut self, x: f64) -> f64 {
        if x < 0.0 {
            self.rng = StdRng::seed_from_u64(x.trunc() as i64 as u64);
            self.last_rnd = self.rng.gen::<f64>();
        } else if x > 0.0 {
            self.last_rnd = self.rng.gen::<f64>();
        }
        self.last_rnd
    }

    fn call_fn(&mut self, name: &Name, arg: Value) -> Result<Value, ErrorKind> {
        let (param, body) = self
            .fns
            .get(name)
            .cloned()
            .ok_or(ErrorKind::UndefinedFunction)?;
        let saved = self.scalars.get(&param);
        self.scalars.set(param.clone(), arg)?;
        let result = expr::eval(&body, self);
        self.scalars.set(param, saved)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render::NullRenderer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn interp() -> Interpreter {
        Interpreter::new(Box::new(NullRenderer), Box::new(QueueInput::new(vec![])), Box::new(Vec::new()))
    }

    /// A `Write` sink that hands the test a second handle onto the same
    /// bytes, since `Interpreter::new` takes ownership of its `out`.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn hello_loop_prints_padded_numbers() {
        let out = SharedBuffer::default();
        let mut it = Interpreter::new(
            Box::new(NullRenderer),
            Box::new(QueueInput::new(vec![])),
            Box::new(out.clone()),
        );
        it.load_program("10 FOR I=1 TO 3\n20 PRINT \"HI \";I\n30 NEXT I\n").unwrap();
        let outcome = it.run();
        assert!(matches!(outcome, RunOutcome::Ended));
        let printed = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert_eq!(printed, "HI  1 \nHI  2 \nHI  3 \n");
    }

    #[test]
    fn bare_next_tight_loop_fast_path_reaches_the_same_final_value() {
        let mut it = interp();
        it.load_program("10 FOR I=1 TO 1000\n20 NEXT\n30 PRINT I\n").unwrap();
        let outcome = it.run();
        assert!(matches!(outcome, RunOutcome::Ended));
    }

    #[test]
    fn named_next_completes_without_resetting_the_loop_variable() {
        let out = SharedBuffer::default();
        let mut it = Interpreter::new(
            Box::new(NullRenderer),
            Box::new(QueueInput::new(vec![])),
            Box::new(out.clone()),
        );
        it.load_program("10 FOR I=1 TO 3:PRINT I\n20 NEXT I\n").unwrap();
        let outcome = it.run();
        assert!(matches!(outcome, RunOutcome::Ended));
        let printed = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert_eq!(printed, " 1 \n 2 \n 3 \n");
    }

    #[test]
    fn fast_path_ineligible_when_for_shares_its_line_with_another_statement() {
        let out = SharedBuffer::default();
        let mut it = Interpreter::new(
            Box::new(NullRenderer),
            Box::new(QueueInput::new(vec![])),
            Box::new(out.clone()),
        );
        it.load_program("10 FOR I=1 TO 3:PRINT I\n20 NEXT\n").unwrap();
        let outcome = it.run();
        assert!(matches!(outcome, RunOutcome::Ended));
        let printed = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert_eq!(printed, " 1 \n 2 \n 3 \n");
    }

    #[test]
    fn undefined_goto_target_errors() {
        let mut it = interp();
        it.load_program("10 GOTO 100\n").unwrap();
        match it.run() {
            RunOutcome::UncaughtError(msg) => assert!(msg.contains("UNDEF'D STATEMENT")),
            _ => panic!("expected an uncaught error"),
        }
    }

    #[test]
    fn gosub_return_resumes_after_call_site() {
        let mut it = interp();
        it.load_program("10 GOSUB 100\n20 END\n100 RETURN\n").unwrap();
        assert!(matches!(it.run(), RunOutcome::Ended));
    }

    #[test]
    fn auto_dim_and_bad_subscript() {
        let mut it = interp();
        it.load_program("10 A(3) = 7\n").unwrap();
        it.run();
        assert_eq!(
            it.arrays.get(&Name::new("A"), &[3]).unwrap(),
            Value::number(7.0)
        );
        assert_eq!(
            it.arrays.get(&Name::new("A"), &[11]).unwrap_err(),
            ErrorKind::BadSubscript
        );
    }

    #[test]
    fn onerr_trap_latches_error_line() {
        let mut it = interp();
        it.load_program("10 ONERR GOTO 100\n20 PRINT 1/0\n30 END\n100 PRINT \"CAUGHT\"\n")
            .unwrap();
        assert!(matches!(it.run(), RunOutcome::Ended));
        assert_eq!(
            it.memory.peek_u16(crate::constants::ERR_LINE_LO.min(crate::constants::ERR_LINE_HI)),
            20
        );
    }

    #[test]
    fn restore_resets_data_cursor() {
        let mut it = interp();
        it.load_program("10 DATA 1,2,3\n20 READ A\n30 RESTORE\n40 READ B\n").unwrap();
        it.run();
        assert_eq!(it.scalars.get(&Name::new("A")), Value::number(1.0));
        assert_eq!(it.scalars.get(&Name::new("B")), Value::number(1.0));
    }

    #[test]
    fn new_program_clears_everything() {
        let mut it = interp();
        it.load_program("10 A = 1\n").unwrap();
        it.run();
        it.new_program();
        assert!(it.program.is_empty());
        assert_eq!(it.scalars.get(&Name::new("A")), Value::number(0.0));
    }
}
