use tracing::debug;

use crate::ops::NativeFunction;
use crate::token::{ParseError, Scanner};
use crate::util::fast_map::FastHashMap;
use crate::vm::bytecode::{Block, BlockId, BlockKind};
use crate::vm::compiler::Compiler;

/// A compiled program: the block arena, the entry block, the declared
/// events, and the compile error state (if any).
///
/// A program that reports an error must not be handed to a machine; check
/// [`ScriptProgram::has_error`] first.
pub struct ScriptProgram {
    pub(crate) blocks: Vec<Block>,
    pub(crate) main_block: BlockId,
    pub(crate) events: FastHashMap<String, BlockId>,
    error: Option<ParseError>,
}

impl ScriptProgram {
    /// Compile `source` against the builtin operation table plus the host's
    /// native functions. Host entries with a builtin's name replace the
    /// builtin. Errors do not propagate; they are stored on the program.
    pub fn compile(source: &str, host_fns: &[NativeFunction]) -> ScriptProgram {
        let mut program = ScriptProgram {
            blocks: Vec::new(),
            main_block: 0,
            events: FastHashMap::default(),
            error: None,
        };
        program.main_block = program.new_block(0, BlockKind::Normal);

        let chars: Vec<char> = source.chars().collect();
        let result = Scanner::new(&chars)
            .and_then(|lex| Compiler::new(&mut program, lex).compile(host_fns));
        match result {
            Ok(()) => {
                debug!(
                    blocks = program.blocks.len(),
                    events = program.events.len(),
                    "compiled program"
                );
            }
            Err(err) => {
                debug!(line = err.line, message = %err.message, "compilation failed");
                program.error = Some(err);
            }
        }
        program
    }

    pub(crate) fn new_block(&mut self, level: u32, kind: BlockKind) -> BlockId {
        self.blocks.push(Block::new(level, kind));
        self.blocks.len() - 1
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_message(&self) -> &str {
        self.error.as_ref().map(|e| e.message.as_str()).unwrap_or("")
    }

    pub fn error_line(&self) -> u32 {
        self.error.as_ref().map(|e| e.line).unwrap_or(0)
    }

    pub fn main_block(&self) -> BlockId {
        self.main_block
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn event(&self, name: &str) -> Option<BlockId> {
        self.events.get(name).copied()
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }
}
