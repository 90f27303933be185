use crate::Reader;
use crate::function::{Clamper, Values};
use crate::object::Stream;
use crate::object::number;
use crate::trivia::{is_regular_character, skip_white_spaces_and_comments};
use log::warn;
use smallvec::SmallVec;

// Limits taken from the PostScript implementation limits for calculator functions.
const MAX_OPERANDS: usize = 100;
const MAX_PROCEDURE_DEPTH: u32 = 64;

/// A type 4 function (PostScript calculator function).
#[derive(Debug)]
pub struct Type4 {
    program: Vec<Op>,
    pub(crate) clamper: Clamper,
}

impl Type4 {
    pub(crate) fn new(stream: &Stream) -> Option<Self> {
        let clamper = Clamper::new(stream.dict())?;
        let program = parse(&stream.decoded()?)?;

        Some(Self { program, clamper })
    }

    pub(crate) fn eval(&self, mut input: Values) -> Option<Values> {
        self.clamper.clamp_input(&mut input);

        let mut stack = OperandStack::default();

        for value in input {
            stack.push(Operand::Real(value))?;
        }

        run(&self.program, &mut stack)?;

        let mut out: Values = stack.items.iter().map(|o| o.real()).collect();
        self.clamper.clamp_output(&mut out);

        Some(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Real(f32),
    Bool(bool),
}

impl Operand {
    fn real(self) -> f32 {
        match self {
            Self::Real(r) => r,
            Self::Bool(b) => f32::from(u8::from(b)),
        }
    }

    fn int(self) -> i32 {
        self.real() as i32
    }

    fn truthy(self) -> bool {
        match self {
            Self::Real(r) => r != 0.0,
            Self::Bool(b) => b,
        }
    }
}

#[derive(Default)]
struct OperandStack {
    items: SmallVec<[Operand; 16]>,
}

impl OperandStack {
    fn push(&mut self, operand: Operand) -> Option<()> {
        if self.items.len() >= MAX_OPERANDS {
            warn!("calculator function overflowed its operand stack");

            return None;
        }

        self.items.push(operand);

        Some(())
    }

    fn pop(&mut self) -> Option<Operand> {
        let operand = self.items.pop();

        if operand.is_none() {
            warn!("calculator function underflowed its operand stack");
        }

        operand
    }

    fn pop_real(&mut self) -> Option<f32> {
        self.pop().map(Operand::real)
    }

    // Operand count for `copy`, `index` and `roll`, which must be a non-negative integer.
    fn pop_count(&mut self) -> Option<usize> {
        usize::try_from(self.pop()?.int()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unary {
    Abs,
    Ceiling,
    Cos,
    Cvi,
    Cvr,
    Floor,
    Ln,
    Log,
    Neg,
    Round,
    Sin,
    Sqrt,
    Truncate,
}

impl Unary {
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::Abs => x.abs(),
            Self::Ceiling => x.ceil(),
            // Angles are given in degrees.
            Self::Cos => x.to_radians().cos(),
            Self::Sin => x.to_radians().sin(),
            Self::Cvi | Self::Truncate => x.trunc(),
            Self::Cvr => x,
            Self::Floor => x.floor(),
            Self::Ln => x.ln(),
            Self::Log => x.log10(),
            Self::Neg => -x,
            Self::Round => x.round(),
            Self::Sqrt => x.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Binary {
    Add,
    Atan,
    Bitshift,
    Div,
    Exp,
    Idiv,
    Mod,
    Mul,
    Sub,
}

impl Binary {
    fn apply(self, a: f32, b: f32) -> Option<f32> {
        let res = match self {
            Self::Add => a + b,
            Self::Atan => {
                let angle = a.atan2(b).to_degrees();

                if angle < 0.0 { angle + 360.0 } else { angle }
            }
            Self::Bitshift => {
                let (value, shift) = (a as i32, b as i32);

                if shift >= 0 {
                    value.checked_shl(shift.unsigned_abs()).unwrap_or(0) as f32
                } else {
                    value.checked_shr(shift.unsigned_abs()).unwrap_or(0) as f32
                }
            }
            Self::Div => a / b,
            Self::Exp => a.powf(b),
            Self::Idiv => (a as i32).checked_div(b as i32)? as f32,
            Self::Mod => (a as i32).checked_rem(b as i32)? as f32,
            Self::Mul => a * b,
            Self::Sub => a - b,
        };

        Some(res)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Compare {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl Compare {
    fn apply(self, a: Operand, b: Operand) -> bool {
        match (self, a, b) {
            (Self::Eq, Operand::Bool(a), Operand::Bool(b)) => a == b,
            (Self::Ne, Operand::Bool(a), Operand::Bool(b)) => a != b,
            (Self::Eq, ..) => a.real() == b.real(),
            (Self::Ne, ..) => a.real() != b.real(),
            (Self::Ge, ..) => a.real() >= b.real(),
            (Self::Gt, ..) => a.real() > b.real(),
            (Self::Le, ..) => a.real() <= b.real(),
            (Self::Lt, ..) => a.real() < b.real(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Logic {
    And,
    Or,
    Xor,
}

impl Logic {
    fn apply(self, a: Operand, b: Operand) -> Operand {
        match (a, b) {
            (Operand::Bool(a), Operand::Bool(b)) => Operand::Bool(match self {
                Self::And => a && b,
                Self::Or => a || b,
                Self::Xor => a ^ b,
            }),
            _ => {
                let (a, b) = (a.int(), b.int());
                let res = match self {
                    Self::And => a & b,
                    Self::Or => a | b,
                    Self::Xor => a ^ b,
                };

                Operand::Real(res as f32)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Push(Operand),
    Unary(Unary),
    Binary(Binary),
    Compare(Compare),
    Logic(Logic),
    Not,
    Copy,
    Dup,
    Exch,
    Index,
    Pop,
    Roll,
    If(Vec<Op>),
    IfElse(Vec<Op>, Vec<Op>),
}

fn run(program: &[Op], stack: &mut OperandStack) -> Option<()> {
    for op in program {
        match op {
            Op::Push(operand) => stack.push(*operand)?,
            Op::Unary(u) => {
                let x = stack.pop_real()?;
                stack.push(Operand::Real(u.apply(x)))?;
            }
            Op::Binary(b) => {
                let rhs = stack.pop_real()?;
                let lhs = stack.pop_real()?;
                stack.push(Operand::Real(b.apply(lhs, rhs)?))?;
            }
            Op::Compare(c) => {
                let rhs = stack.pop()?;
                let lhs = stack.pop()?;
                stack.push(Operand::Bool(c.apply(lhs, rhs)))?;
            }
            Op::Logic(l) => {
                let rhs = stack.pop()?;
                let lhs = stack.pop()?;
                stack.push(l.apply(lhs, rhs))?;
            }
            Op::Not => {
                let res = match stack.pop()? {
                    Operand::Bool(b) => Operand::Bool(!b),
                    other => Operand::Real(!other.int() as f32),
                };
                stack.push(res)?;
            }
            Op::Copy => {
                let n = stack.pop_count()?;
                let start = stack.items.len().checked_sub(n)?;

                for i in start..start + n {
                    let item = stack.items[i];
                    stack.push(item)?;
                }
            }
            Op::Dup => {
                let top = *stack.items.last()?;
                stack.push(top)?;
            }
            Op::Exch => {
                let len = stack.items.len();

                if len < 2 {
                    return None;
                }

                stack.items.swap(len - 1, len - 2);
            }
            Op::Index => {
                let n = stack.pop_count()?;
                let idx = stack.items.len().checked_sub(n + 1)?;
                let item = stack.items[idx];
                stack.push(item)?;
            }
            Op::Pop => {
                stack.pop()?;
            }
            Op::Roll => {
                let j = stack.pop()?.int();
                let n = stack.pop_count()?;
                let start = stack.items.len().checked_sub(n)?;
                let window = &mut stack.items[start..];

                if !window.is_empty() {
                    let shift = j.unsigned_abs() as usize % window.len();

                    if j >= 0 {
                        window.rotate_right(shift);
                    } else {
                        window.rotate_left(shift);
                    }
                }
            }
            Op::If(body) => {
                if stack.pop()?.truthy() {
                    run(body, stack)?;
                }
            }
            Op::IfElse(then, otherwise) => {
                let branch = if stack.pop()?.truthy() { then } else { otherwise };
                run(branch, stack)?;
            }
        }
    }

    Some(())
}

fn parse(data: &[u8]) -> Option<Vec<Op>> {
    let mut r = Reader::new(data);
    parse_block(&mut r, 0)
}

fn parse_block(r: &mut Reader<'_>, depth: u32) -> Option<Vec<Op>> {
    if depth > MAX_PROCEDURE_DEPTH {
        warn!("calculator procedures are nested too deeply");

        return None;
    }

    skip_white_spaces_and_comments(r);
    r.forward_tag(b"{")?;

    let mut ops = vec![];
    // Procedures only appear as operands of `if` and `ifelse`.
    let mut blocks: SmallVec<[Vec<Op>; 2]> = SmallVec::new();

    loop {
        skip_white_spaces_and_comments(r);

        match r.peek_byte()? {
            b'}' => {
                r.forward();
                break;
            }
            b'{' => {
                if blocks.len() == 2 {
                    warn!("too many procedures in calculator function");

                    return None;
                }

                blocks.push(parse_block(r, depth + 1)?);
            }
            _ => {
                let start = r.offset();
                r.forward_while(is_regular_character);
                let token = r.data().get(start..r.offset())?;

                let op = match token {
                    b"if" if blocks.len() == 1 => Op::If(blocks.pop()?),
                    b"ifelse" if blocks.len() == 2 => {
                        let otherwise = blocks.pop()?;
                        let then = blocks.pop()?;
                        Op::IfElse(then, otherwise)
                    }
                    _ if !blocks.is_empty() => {
                        warn!("dangling procedure in calculator function");

                        return None;
                    }
                    _ => parse_op(token)?,
                };

                ops.push(op);
            }
        }
    }

    Some(ops)
}

fn parse_op(token: &[u8]) -> Option<Op> {
    if token.is_empty() {
        warn!("unexpected delimiter in calculator function");

        return None;
    }

    if let Some(n) = number::parse(token) {
        return Some(Op::Push(Operand::Real(n.as_f32())));
    }

    let op = match token {
        b"abs" => Op::Unary(Unary::Abs),
        b"ceiling" => Op::Unary(Unary::Ceiling),
        b"cos" => Op::Unary(Unary::Cos),
        b"cvi" => Op::Unary(Unary::Cvi),
        b"cvr" => Op::Unary(Unary::Cvr),
        b"floor" => Op::Unary(Unary::Floor),
        b"ln" => Op::Unary(Unary::Ln),
        b"log" => Op::Unary(Unary::Log),
        b"neg" => Op::Unary(Unary::Neg),
        b"round" => Op::Unary(Unary::Round),
        b"sin" => Op::Unary(Unary::Sin),
        b"sqrt" => Op::Unary(Unary::Sqrt),
        b"truncate" => Op::Unary(Unary::Truncate),
        b"add" => Op::Binary(Binary::Add),
        b"atan" => Op::Binary(Binary::Atan),
        b"bitshift" => Op::Binary(Binary::Bitshift),
        b"div" => Op::Binary(Binary::Div),
        b"exp" => Op::Binary(Binary::Exp),
        b"idiv" => Op::Binary(Binary::Idiv),
        b"mod" => Op::Binary(Binary::Mod),
        b"mul" => Op::Binary(Binary::Mul),
        b"sub" => Op::Binary(Binary::Sub),
        b"eq" => Op::Compare(Compare::Eq),
        b"ne" => Op::Compare(Compare::Ne),
        b"ge" => Op::Compare(Compare::Ge),
        b"gt" => Op::Compare(Compare::Gt),
        b"le" => Op::Compare(Compare::Le),
        b"lt" => Op::Compare(Compare::Lt),
        b"and" => Op::Logic(Logic::And),
        b"or" => Op::Logic(Logic::Or),
        b"xor" => Op::Logic(Logic::Xor),
        b"not" => Op::Not,
        b"true" => Op::Push(Operand::Bool(true)),
        b"false" => Op::Push(Operand::Bool(false)),
        b"copy" => Op::Copy,
        b"dup" => Op::Dup,
        b"exch" => Op::Exch,
        b"index" => Op::Index,
        b"pop" => Op::Pop,
        b"roll" => Op::Roll,
        _ => {
            warn!(
                "unknown operator {} in calculator function",
                std::str::from_utf8(token).unwrap_or("{non-utf8}")
            );

            return None;
        }
    };

    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Function, FunctionType};
    use smallvec::smallvec;
    use std::sync::Arc;

    fn run_program(program: &str, input: &[f32]) -> Option<Values> {
        let program = parse(format!("{{ {program} }}").as_bytes())?;
        let function = Type4 {
            program,
            clamper: Clamper::default(),
        };

        function.eval(input.iter().copied().collect())
    }

    fn check(program: &str, input: &[f32], expected: &[f32]) {
        let out = run_program(program, input).unwrap();
        assert_eq!(out.as_slice(), expected, "program: {program}");
    }

    #[test]
    fn parse_nested_procedures() {
        let ops = parse(b"{ dup 0.5 gt { pop 1 } { 2 mul } ifelse }").unwrap();

        assert_eq!(ops.len(), 4);
        assert!(matches!(&ops[3], Op::IfElse(t, e) if t.len() == 2 && e.len() == 2));
    }

    #[test]
    fn parse_errors() {
        assert!(parse(b"{ 1 2 frobnicate }").is_none());
        assert!(parse(b"{ 1 2 add").is_none());
        assert!(parse(b"{ { 1 } 2 }").is_none());
        assert!(parse(b"1 2 add").is_none());
    }

    #[test]
    fn arithmetic() {
        check("add", &[1.5, 2.0], &[3.5]);
        check("sub", &[1.0, 3.0], &[-2.0]);
        check("3 mul 1 add", &[2.0], &[7.0]);
        check("2 div", &[1.0], &[0.5]);
        check("7 2 idiv", &[], &[3.0]);
        check("-7 2 mod", &[], &[-1.0]);
        check("2 exp", &[3.0], &[9.0]);
        check("sqrt", &[16.0], &[4.0]);
        check("neg abs", &[2.5], &[2.5]);
        check("1.5 floor 1.5 ceiling -1.5 truncate", &[], &[1.0, 2.0, -1.0]);
        check("1.5 round cvi", &[], &[2.0]);
        check("1 10 log", &[], &[1.0, 1.0]);
    }

    #[test]
    fn division_by_zero_integer() {
        assert!(run_program("1 0 idiv", &[]).is_none());
        assert!(run_program("1 0 mod", &[]).is_none());
    }

    #[test]
    fn trigonometry_in_degrees() {
        let out = run_program("90 sin 0 cos", &[]).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);

        check("-1 0 atan", &[], &[270.0]);
    }

    #[test]
    fn relational_and_boolean() {
        check("1 2 lt", &[], &[1.0]);
        check("1 2 ge", &[], &[0.0]);
        check("true false or", &[], &[1.0]);
        check("true true xor", &[], &[0.0]);
        check("5 3 and", &[], &[1.0]);
        check("5 not", &[], &[-6.0]);
        check("1 3 bitshift 16 -2 bitshift", &[], &[8.0, 4.0]);
    }

    #[test]
    fn stack_operators() {
        check("exch", &[1.0, 2.0], &[2.0, 1.0]);
        check("dup", &[1.0], &[1.0, 1.0]);
        check("2 copy", &[1.0, 2.0], &[1.0, 2.0, 1.0, 2.0]);
        check("2 index", &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 1.0]);
        check("pop", &[1.0, 2.0], &[1.0]);
        check("3 1 roll", &[1.0, 2.0, 3.0], &[3.0, 1.0, 2.0]);
        check("3 -1 roll", &[1.0, 2.0, 3.0], &[2.0, 3.0, 1.0]);
    }

    #[test]
    fn conditionals() {
        let program = "dup 0.5 gt { pop 1 } { 2 mul } ifelse";
        check(program, &[0.75], &[1.0]);
        check(program, &[0.25], &[0.5]);
        check("0.5 lt { 7 } if", &[0.25], &[7.0]);
        check("0.5 lt { 7 } if", &[0.75], &[]);
    }

    #[test]
    fn stack_limits() {
        assert!(run_program("pop", &[]).is_none());
        assert!(run_program(&"1 ".repeat(MAX_OPERANDS + 1), &[]).is_none());
    }

    #[test]
    fn clamps_input_and_output() {
        let function = Function(Arc::new(FunctionType::PostScript(Type4 {
            program: parse(b"{ 2 mul }").unwrap(),
            clamper: Clamper {
                domain: smallvec![(0.0, 1.0)],
                range: Some(smallvec![(0.0, 1.5)]),
            },
        })));

        assert_eq!(function.eval(smallvec![0.5]).unwrap().as_slice(), &[1.0]);
        assert_eq!(function.eval(smallvec![4.0]).unwrap().as_slice(), &[1.5]);
    }
}
