//! Interpreter for validated naga IR.
//!
//! Covers straight-line shader code: arithmetic, vector/matrix math, the common
//! math builtins, local and private variables, uniform reads, `if`, function
//! calls and `discard`. Loops, switches, textures and atomics are rejected.

use std::collections::HashMap;

use naga::{
    AddressSpace, ArraySize, BinaryOperator, Block, Expression, Function, GlobalVariable, Handle,
    Literal, LocalVariable, MathFunction, Module, ScalarKind, Statement, SwizzleComponent, Type,
    TypeInner, UnaryOperator, VectorSize,
};

use naga::valid::{FunctionInfo, ModuleInfo};

use crate::shader::UniformStorage;

pub(crate) type EvalResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    /// Scalar (one component) or vector. Booleans are `0.0` / `1.0`.
    Num(Vec<f32>),
    /// Struct members, matrix columns or array elements.
    Composite(Vec<Value>),
    Pointer(Place),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Place {
    root: Root,
    path: Vec<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Root {
    Local(Handle<LocalVariable>),
    Global(Handle<GlobalVariable>),
}

impl Value {
    pub fn scalar(v: f32) -> Self {
        Value::Num(vec![v])
    }

    pub fn components(&self) -> EvalResult<&[f32]> {
        match self {
            Value::Num(v) => Ok(v),
            _ => Err("expected a scalar or vector value".into()),
        }
    }

    fn first(&self) -> EvalResult<f32> {
        self.components()?
            .first()
            .copied()
            .ok_or_else(|| "empty vector".into())
    }

    fn into_place(self) -> EvalResult<Place> {
        match self {
            Value::Pointer(p) => Ok(p),
            _ => Err("expected a pointer".into()),
        }
    }
}

/// How a function body finished.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Return(Option<Value>),
    Discard,
}

enum Flow {
    Next,
    Return(Option<Value>),
    Discard,
}

struct Frame<'m> {
    function: &'m Function,
    info: &'m FunctionInfo,
    args: Vec<Value>,
    cache: Vec<Option<Value>>,
    locals: HashMap<Handle<LocalVariable>, Value>,
}

const MAX_CALL_DEPTH: u32 = 32;

pub(crate) struct Interpreter<'m> {
    module: &'m Module,
    module_info: &'m ModuleInfo,
    uniforms: &'m UniformStorage,
    privates: HashMap<Handle<GlobalVariable>, Value>,
    depth: u32,
}

impl<'m> Interpreter<'m> {
    pub fn new(
        module: &'m Module,
        module_info: &'m ModuleInfo,
        uniforms: &'m UniformStorage,
    ) -> Self {
        Self {
            module,
            module_info,
            uniforms,
            privates: HashMap::new(),
            depth: 0,
        }
    }

    /// Runs an entry point body. Private globals start from their initializers.
    pub fn run(
        &mut self,
        function: &'m Function,
        info: &'m FunctionInfo,
        args: Vec<Value>,
    ) -> EvalResult<Outcome> {
        self.privates.clear();
        self.call(function, info, args)
    }

    fn call(
        &mut self,
        function: &'m Function,
        info: &'m FunctionInfo,
        args: Vec<Value>,
    ) -> EvalResult<Outcome> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err("call depth limit exceeded".into());
        }
        self.depth += 1;

        let mut frame = Frame {
            function,
            info,
            args,
            cache: vec![None; function.expressions.len()],
            locals: HashMap::new(),
        };

        let result = self.enter(&mut frame);
        self.depth -= 1;

        match result? {
            Flow::Next => Ok(Outcome::Return(None)),
            Flow::Return(v) => Ok(Outcome::Return(v)),
            Flow::Discard => Ok(Outcome::Discard),
        }
    }

    fn enter(&mut self, frame: &mut Frame<'m>) -> EvalResult<Flow> {
        let function = frame.function;
        for (h, local) in function.local_variables.iter() {
            let v = match local.init {
                Some(init) => self.eval(frame, init)?,
                None => zero_value(self.module, local.ty),
            };
            frame.locals.insert(h, v);
        }
        self.exec_block(frame, &function.body)
    }

    // ── statements ──────────────────────────────────────────────────────

    fn exec_block(&mut self, frame: &mut Frame<'m>, block: &'m Block) -> EvalResult<Flow> {
        for stmt in block.iter() {
            let flow = match stmt {
                Statement::Emit(range) => {
                    for h in range.clone() {
                        self.eval(frame, h)?;
                    }
                    Flow::Next
                }
                Statement::Block(inner) => self.exec_block(frame, inner)?,
                Statement::If {
                    condition,
                    accept,
                    reject,
                } => {
                    let taken = self.eval(frame, *condition)?.first()? != 0.0;
                    self.exec_block(frame, if taken { accept } else { reject })?
                }
                Statement::Store { pointer, value } => {
                    let place = self.eval(frame, *pointer)?.into_place()?;
                    let v = self.eval(frame, *value)?;
                    self.store(frame, &place, v)?;
                    Flow::Next
                }
                Statement::Return { value } => Flow::Return(match value {
                    Some(h) => Some(self.eval(frame, *h)?),
                    None => None,
                }),
                Statement::Kill => Flow::Discard,
                Statement::Call {
                    function,
                    arguments,
                    result,
                } => {
                    let args = arguments
                        .iter()
                        .map(|a| self.eval(frame, *a))
                        .collect::<EvalResult<Vec<_>>>()?;
                    let (module, module_info) = (self.module, self.module_info);
                    match self.call(&module.functions[*function], &module_info[*function], args)? {
                        Outcome::Discard => Flow::Discard,
                        Outcome::Return(v) => {
                            if let (Some(r), Some(v)) = (result, v) {
                                frame.cache[r.index()] = Some(v);
                            }
                            Flow::Next
                        }
                    }
                }
                _ => return Err("unsupported statement (loops, switches and barriers)".into()),
            };

            if !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }
        Ok(Flow::Next)
    }

    // ── expressions ─────────────────────────────────────────────────────

    fn eval(&mut self, frame: &mut Frame<'m>, h: Handle<Expression>) -> EvalResult<Value> {
        if let Some(v) = &frame.cache[h.index()] {
            return Ok(v.clone());
        }

        let module = self.module;
        let function = frame.function;
        let v = match &function.expressions[h] {
            Expression::Literal(l) => literal(l)?,
            Expression::Constant(c) => self.eval_global(module.constants[*c].init)?,
            Expression::ZeroValue(ty) => zero_value(module, *ty),
            Expression::Compose { ty, components } => {
                let parts = components
                    .iter()
                    .map(|c| self.eval(frame, *c))
                    .collect::<EvalResult<Vec<_>>>()?;
                compose(module, *ty, parts)?
            }
            Expression::Splat { size, value } => {
                let v = self.eval(frame, *value)?.first()?;
                Value::Num(vec![v; vector_len(*size)])
            }
            Expression::Swizzle {
                size,
                vector,
                pattern,
            } => {
                let v = self.eval(frame, *vector)?;
                swizzle(v.components()?, &pattern[..vector_len(*size)])?
            }
            Expression::AccessIndex { base, index } => {
                let b = self.eval(frame, *base)?;
                access(b, *index as usize)?
            }
            Expression::Access { base, index } => {
                let b = self.eval(frame, *base)?;
                let i = self.eval(frame, *index)?.first()?;
                if i < 0.0 {
                    return Err("negative index".into());
                }
                access(b, i as usize)?
            }
            Expression::FunctionArgument(i) => frame
                .args
                .get(*i as usize)
                .cloned()
                .ok_or_else(|| format!("missing function argument {i}"))?,
            Expression::GlobalVariable(g) => Value::Pointer(Place {
                root: Root::Global(*g),
                path: Vec::new(),
            }),
            Expression::LocalVariable(l) => Value::Pointer(Place {
                root: Root::Local(*l),
                path: Vec::new(),
            }),
            Expression::Load { pointer } => {
                let place = self.eval(frame, *pointer)?.into_place()?;
                self.load(frame, &place)?
            }
            Expression::Unary { op, expr } => {
                let v = self.eval(frame, *expr)?;
                unary(*op, &v)?
            }
            Expression::Binary { op, left, right } => {
                let l = self.eval(frame, *left)?;
                let r = self.eval(frame, *right)?;
                let kind = frame.info[*left].ty.inner_with(&module.types).scalar_kind();
                binary(*op, kind, &l, &r)?
            }
            Expression::Select {
                condition,
                accept,
                reject,
            } => {
                let c = self.eval(frame, *condition)?;
                let a = self.eval(frame, *accept)?;
                let r = self.eval(frame, *reject)?;
                select(&c, a, r)?
            }
            Expression::Math {
                fun,
                arg,
                arg1,
                arg2,
                ..
            } => {
                let a = self.eval(frame, *arg)?;
                let b = match arg1 {
                    Some(h) => Some(self.eval(frame, *h)?),
                    None => None,
                };
                let c = match arg2 {
                    Some(h) => Some(self.eval(frame, *h)?),
                    None => None,
                };
                math(*fun, &a, b.as_ref(), c.as_ref())?
            }
            Expression::As { expr, kind, .. } => {
                let v = self.eval(frame, *expr)?;
                cast(&v, *kind)?
            }
            Expression::CallResult(_) => return Err("call result read before the call".into()),
            _ => return Err("unsupported expression".into()),
        };

        frame.cache[h.index()] = Some(v.clone());
        Ok(v)
    }

    /// Constant expressions from the module-level arena.
    fn eval_global(&self, h: Handle<Expression>) -> EvalResult<Value> {
        let module = self.module;
        match &module.global_expressions[h] {
            Expression::Literal(l) => literal(l),
            Expression::Constant(c) => self.eval_global(module.constants[*c].init),
            Expression::ZeroValue(ty) => Ok(zero_value(module, *ty)),
            Expression::Compose { ty, components } => {
                let parts = components
                    .iter()
                    .map(|c| self.eval_global(*c))
                    .collect::<EvalResult<Vec<_>>>()?;
                compose(module, *ty, parts)
            }
            Expression::Splat { size, value } => {
                let v = self.eval_global(*value)?.first()?;
                Ok(Value::Num(vec![v; vector_len(*size)]))
            }
            _ => Err("unsupported constant expression".into()),
        }
    }

    // ── memory ──────────────────────────────────────────────────────────

    fn load(&self, frame: &Frame<'m>, place: &Place) -> EvalResult<Value> {
        let root = match place.root {
            Root::Local(l) => frame
                .locals
                .get(&l)
                .cloned()
                .ok_or("unknown local variable")?,
            Root::Global(g) => self.global_value(g)?,
        };
        place.path.iter().try_fold(root, |v, &i| access(v, i))
    }

    fn global_value(&self, g: Handle<GlobalVariable>) -> EvalResult<Value> {
        let module = self.module;
        let var = &module.global_variables[g];
        match var.space {
            AddressSpace::Uniform => {
                let res = var.binding.as_ref().ok_or("uniform without binding")?;
                let block = self
                    .uniforms
                    .table()
                    .block_index(res.group, res.binding)
                    .ok_or("uniform block is not part of the linked program")?;
                decode(module, var.ty, self.uniforms.block_bytes(block), 0)
            }
            AddressSpace::Private | AddressSpace::WorkGroup => match self.privates.get(&g) {
                Some(v) => Ok(v.clone()),
                None => match var.init {
                    Some(init) => self.eval_global(init),
                    None => Ok(zero_value(module, var.ty)),
                },
            },
            _ => Err("unsupported address space".into()),
        }
    }

    fn store(&mut self, frame: &mut Frame<'m>, place: &Place, value: Value) -> EvalResult<()> {
        match place.root {
            Root::Local(l) => {
                let slot = frame.locals.get_mut(&l).ok_or("unknown local variable")?;
                write_path(slot, &place.path, value)
            }
            Root::Global(g) => {
                if self.module.global_variables[g].space != AddressSpace::Private {
                    return Err("store to a read-only global".into());
                }
                let mut current = self.global_value(g)?;
                write_path(&mut current, &place.path, value)?;
                self.privates.insert(g, current);
                Ok(())
            }
        }
    }
}

fn write_path(target: &mut Value, path: &[usize], value: Value) -> EvalResult<()> {
    let Some((&i, rest)) = path.split_first() else {
        *target = value;
        return Ok(());
    };
    match target {
        Value::Composite(items) => {
            let item = items.get_mut(i).ok_or("store index out of range")?;
            write_path(item, rest, value)
        }
        Value::Num(c) if rest.is_empty() => {
            let x = value.first()?;
            *c.get_mut(i).ok_or("store index out of range")? = x;
            Ok(())
        }
        _ => Err("invalid store target".into()),
    }
}

fn access(base: Value, i: usize) -> EvalResult<Value> {
    match base {
        Value::Pointer(mut p) => {
            p.path.push(i);
            Ok(Value::Pointer(p))
        }
        Value::Num(c) => c
            .get(i)
            .map(|v| Value::scalar(*v))
            .ok_or_else(|| format!("component index {i} out of range")),
        Value::Composite(mut items) => {
            if i < items.len() {
                Ok(items.swap_remove(i))
            } else {
                Err(format!("index {i} out of range"))
            }
        }
    }
}

// ── types ───────────────────────────────────────────────────────────────

pub(crate) fn vector_len(size: VectorSize) -> usize {
    match size {
        VectorSize::Bi => 2,
        VectorSize::Tri => 3,
        VectorSize::Quad => 4,
    }
}

/// Component count of a scalar or vector type.
pub(crate) fn component_count(module: &Module, ty: Handle<Type>) -> Option<usize> {
    match &module.types[ty].inner {
        TypeInner::Scalar(_) => Some(1),
        TypeInner::Vector { size, .. } => Some(vector_len(*size)),
        _ => None,
    }
}

pub(crate) fn zero_value(module: &Module, ty: Handle<Type>) -> Value {
    match &module.types[ty].inner {
        TypeInner::Scalar(_) => Value::scalar(0.0),
        TypeInner::Vector { size, .. } => Value::Num(vec![0.0; vector_len(*size)]),
        TypeInner::Matrix { columns, rows, .. } => Value::Composite(vec![
            Value::Num(vec![0.0; vector_len(*rows)]);
            vector_len(*columns)
        ]),
        TypeInner::Struct { members, .. } => Value::Composite(
            members
                .iter()
                .map(|m| zero_value(module, m.ty))
                .collect(),
        ),
        TypeInner::Array {
            base,
            size: ArraySize::Constant(n),
            ..
        } => Value::Composite(vec![zero_value(module, *base); n.get() as usize]),
        _ => Value::Composite(Vec::new()),
    }
}

fn compose(module: &Module, ty: Handle<Type>, parts: Vec<Value>) -> EvalResult<Value> {
    match &module.types[ty].inner {
        TypeInner::Scalar(_) | TypeInner::Vector { .. } => {
            let mut out = Vec::with_capacity(4);
            for p in &parts {
                out.extend_from_slice(p.components()?);
            }
            Ok(Value::Num(out))
        }
        _ => Ok(Value::Composite(parts)),
    }
}

fn decode(module: &Module, ty: Handle<Type>, bytes: &[u8], offset: usize) -> EvalResult<Value> {
    match &module.types[ty].inner {
        TypeInner::Scalar(s) => Ok(Value::scalar(read_scalar(bytes, offset, s.kind)?)),
        TypeInner::Vector { size, scalar } => (0..vector_len(*size))
            .map(|i| read_scalar(bytes, offset + 4 * i, scalar.kind))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Num),
        TypeInner::Matrix { columns, rows, .. } => {
            let column_stride = if *rows == VectorSize::Bi { 8 } else { 16 };
            (0..vector_len(*columns))
                .map(|c| {
                    (0..vector_len(*rows))
                        .map(|r| read_scalar(bytes, offset + c * column_stride + r * 4, ScalarKind::Float))
                        .collect::<EvalResult<Vec<_>>>()
                        .map(Value::Num)
                })
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Composite)
        }
        TypeInner::Struct { members, .. } => members
            .iter()
            .map(|m| decode(module, m.ty, bytes, offset + m.offset as usize))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Composite),
        TypeInner::Array {
            base,
            size: ArraySize::Constant(n),
            stride,
        } => (0..n.get() as usize)
            .map(|i| decode(module, *base, bytes, offset + i * *stride as usize))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Composite),
        _ => Err("unsupported uniform type".into()),
    }
}

fn read_scalar(bytes: &[u8], offset: usize, kind: ScalarKind) -> EvalResult<f32> {
    let raw: [u8; 4] = bytes
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or("uniform read out of bounds")?;
    match kind {
        ScalarKind::Float => Ok(f32::from_le_bytes(raw)),
        ScalarKind::Sint => Ok(i32::from_le_bytes(raw) as f32),
        ScalarKind::Uint | ScalarKind::Bool => Ok(u32::from_le_bytes(raw) as f32),
        _ => Err("unsupported scalar kind".into()),
    }
}

// ── operators ───────────────────────────────────────────────────────────

fn b2f(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

fn literal(l: &Literal) -> EvalResult<Value> {
    let v = match *l {
        Literal::F32(v) => v,
        Literal::F64(v) => v as f32,
        Literal::I32(v) => v as f32,
        Literal::U32(v) => v as f32,
        Literal::I64(v) => v as f32,
        Literal::U64(v) => v as f32,
        Literal::Bool(b) => b2f(b),
        Literal::AbstractInt(v) => v as f32,
        Literal::AbstractFloat(v) => v as f32,
        _ => return Err("unsupported literal".into()),
    };
    Ok(Value::scalar(v))
}

fn swizzle(c: &[f32], pattern: &[SwizzleComponent]) -> EvalResult<Value> {
    pattern
        .iter()
        .map(|p| {
            let i = match p {
                SwizzleComponent::X => 0,
                SwizzleComponent::Y => 1,
                SwizzleComponent::Z => 2,
                SwizzleComponent::W => 3,
            };
            c.get(i).copied().ok_or_else(|| "swizzle out of range".to_string())
        })
        .collect::<EvalResult<Vec<_>>>()
        .map(Value::Num)
}

/// Applies `f` component-wise, broadcasting single-component operands.
fn zip(a: &[f32], b: &[f32], f: impl Fn(f32, f32) -> f32) -> EvalResult<Value> {
    let n = a.len().max(b.len());
    if !(a.len() == n || a.len() == 1) || !(b.len() == n || b.len() == 1) {
        return Err("operand size mismatch".into());
    }
    let at = |v: &[f32], i: usize| if v.len() == 1 { v[0] } else { v[i] };
    Ok(Value::Num((0..n).map(|i| f(at(a, i), at(b, i))).collect()))
}

fn zip3(a: &[f32], b: &[f32], c: &[f32], f: impl Fn(f32, f32, f32) -> f32) -> EvalResult<Value> {
    let n = a.len().max(b.len()).max(c.len());
    for v in [a, b, c] {
        if v.len() != n && v.len() != 1 {
            return Err("operand size mismatch".into());
        }
    }
    let at = |v: &[f32], i: usize| if v.len() == 1 { v[0] } else { v[i] };
    Ok(Value::Num(
        (0..n).map(|i| f(at(a, i), at(b, i), at(c, i))).collect(),
    ))
}

fn map(a: &[f32], f: impl Fn(f32) -> f32) -> Value {
    Value::Num(a.iter().copied().map(f).collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn columns(m: &[Value]) -> EvalResult<Vec<&[f32]>> {
    m.iter().map(Value::components).collect()
}

fn mat_vec(m: &[Value], v: &[f32]) -> EvalResult<Value> {
    let cols = columns(m)?;
    if cols.len() != v.len() {
        return Err("matrix/vector size mismatch".into());
    }
    let rows = cols.first().map_or(0, |c| c.len());
    Ok(Value::Num(
        (0..rows)
            .map(|r| cols.iter().zip(v).map(|(c, x)| c[r] * x).sum())
            .collect(),
    ))
}

fn unary(op: UnaryOperator, v: &Value) -> EvalResult<Value> {
    let c = v.components()?;
    match op {
        UnaryOperator::Negate => Ok(map(c, |x| -x)),
        UnaryOperator::LogicalNot => Ok(map(c, |x| b2f(x == 0.0))),
        _ => Err("unsupported unary operator".into()),
    }
}

/// `kind` is the scalar kind of the left operand; integer division truncates.
fn binary(op: BinaryOperator, kind: Option<ScalarKind>, l: &Value, r: &Value) -> EvalResult<Value> {
    use BinaryOperator as B;

    if op == B::Multiply {
        match (l, r) {
            (Value::Composite(m), Value::Num(v)) if v.len() > 1 => return mat_vec(m, v),
            (Value::Num(v), Value::Composite(m)) if v.len() > 1 => {
                return Ok(Value::Num(
                    columns(m)?.iter().map(|c| dot(v, c)).collect(),
                ));
            }
            (Value::Composite(a), Value::Composite(b)) => {
                return b
                    .iter()
                    .map(|col| mat_vec(a, col.components()?))
                    .collect::<EvalResult<Vec<_>>>()
                    .map(Value::Composite);
            }
            (Value::Composite(m), s @ Value::Num(_)) | (s @ Value::Num(_), Value::Composite(m)) => {
                let k = s.first()?;
                return m
                    .iter()
                    .map(|c| Ok(map(c.components()?, |x| x * k)))
                    .collect::<EvalResult<Vec<_>>>()
                    .map(Value::Composite);
            }
            _ => {}
        }
    }

    if let (Value::Composite(a), Value::Composite(b)) = (l, r) {
        if matches!(op, B::Add | B::Subtract) && a.len() == b.len() {
            return a
                .iter()
                .zip(b)
                .map(|(x, y)| binary(op, kind, x, y))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Composite);
        }
    }

    let integer = matches!(
        kind,
        Some(ScalarKind::Sint | ScalarKind::Uint | ScalarKind::AbstractInt)
    );
    let (a, b) = (l.components()?, r.components()?);
    match op {
        B::Add => zip(a, b, |x, y| x + y),
        B::Subtract => zip(a, b, |x, y| x - y),
        B::Multiply => zip(a, b, |x, y| x * y),
        // Integer division by zero yields the dividend, remainder by zero yields 0.
        B::Divide if integer => zip(a, b, |x, y| if y == 0.0 { x } else { (x / y).trunc() }),
        B::Modulo if integer => zip(a, b, |x, y| if y == 0.0 { 0.0 } else { x % y }),
        B::Divide => zip(a, b, |x, y| x / y),
        B::Modulo => zip(a, b, |x, y| x % y),
        B::Equal => zip(a, b, |x, y| b2f(x == y)),
        B::NotEqual => zip(a, b, |x, y| b2f(x != y)),
        B::Less => zip(a, b, |x, y| b2f(x < y)),
        B::LessEqual => zip(a, b, |x, y| b2f(x <= y)),
        B::Greater => zip(a, b, |x, y| b2f(x > y)),
        B::GreaterEqual => zip(a, b, |x, y| b2f(x >= y)),
        B::LogicalAnd => zip(a, b, |x, y| b2f(x != 0.0 && y != 0.0)),
        B::LogicalOr => zip(a, b, |x, y| b2f(x != 0.0 || y != 0.0)),
        _ => Err("unsupported binary operator".into()),
    }
}

fn select(condition: &Value, accept: Value, reject: Value) -> EvalResult<Value> {
    let c = condition.components()?;
    if c.len() == 1 {
        return Ok(if c[0] != 0.0 { accept } else { reject });
    }
    zip3(c, accept.components()?, reject.components()?, |c, a, r| {
        if c != 0.0 { a } else { r }
    })
}

fn cast(v: &Value, kind: ScalarKind) -> EvalResult<Value> {
    let c = v.components()?;
    match kind {
        ScalarKind::Float | ScalarKind::AbstractFloat => Ok(map(c, |x| x)),
        ScalarKind::Sint | ScalarKind::AbstractInt => Ok(map(c, f32::trunc)),
        ScalarKind::Uint => Ok(map(c, |x| x.trunc().max(0.0))),
        ScalarKind::Bool => Ok(map(c, |x| b2f(x != 0.0))),
    }
}

fn arg(v: Option<&Value>) -> EvalResult<&[f32]> {
    v.ok_or_else(|| "missing math argument".to_string())?
        .components()
}

fn math(fun: MathFunction, a: &Value, b: Option<&Value>, c: Option<&Value>) -> EvalResult<Value> {
    use MathFunction as M;

    let x = a.components()?;

    match fun {
        M::Abs => Ok(map(x, f32::abs)),
        M::Sin => Ok(map(x, f32::sin)),
        M::Cos => Ok(map(x, f32::cos)),
        M::Tan => Ok(map(x, f32::tan)),
        M::Sqrt => Ok(map(x, f32::sqrt)),
        M::Exp => Ok(map(x, f32::exp)),
        M::Log => Ok(map(x, f32::ln)),
        M::Floor => Ok(map(x, f32::floor)),
        M::Ceil => Ok(map(x, f32::ceil)),
        M::Fract => Ok(map(x, |v| v - v.floor())),
        M::Round => Ok(map(x, f32::round_ties_even)),
        M::Sign => Ok(map(x, |v| if v == 0.0 { 0.0 } else { v.signum() })),
        M::Saturate => Ok(map(x, |v| v.clamp(0.0, 1.0))),
        M::Length => Ok(Value::scalar(dot(x, x).sqrt())),
        M::Normalize => {
            let len = dot(x, x).sqrt();
            Ok(map(x, |v| v / len))
        }
        M::Min => zip(x, arg(b)?, f32::min),
        M::Max => zip(x, arg(b)?, f32::max),
        M::Pow => zip(x, arg(b)?, f32::powf),
        M::Step => zip(x, arg(b)?, |edge, v| b2f(v >= edge)),
        M::Dot => Ok(Value::scalar(dot(x, arg(b)?))),
        M::Distance => {
            let d = zip(x, arg(b)?, |p, q| p - q)?;
            let d = d.components()?;
            Ok(Value::scalar(dot(d, d).sqrt()))
        }
        M::Clamp => zip3(x, arg(b)?, arg(c)?, |v, lo, hi| v.max(lo).min(hi)),
        M::Mix => zip3(x, arg(b)?, arg(c)?, |p, q, t| p * (1.0 - t) + q * t),
        M::SmoothStep => zip3(x, arg(b)?, arg(c)?, |lo, hi, v| {
            let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
            t * t * (3.0 - 2.0 * t)
        }),
        _ => Err("unsupported math function".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{ShaderStage, UniformTable, UniformValue, compile_stage, link};

    fn run_fragment(src: &str, set: &[(&str, UniformValue)]) -> Vec<f32> {
        let vs = compile_stage(ShaderStage::Vertex, src).unwrap();
        let fs = compile_stage(ShaderStage::Fragment, src).unwrap();
        let iface = link(&vs, &fs).unwrap();
        let mut storage = UniformStorage::new(iface.uniforms.clone());
        for (name, value) in set {
            let slot = iface.uniforms.find(name).unwrap();
            storage.write(slot as u32, *value).unwrap();
        }
        let ep = fs.entry().unwrap();
        let mut interp = Interpreter::new(&fs.module, &fs.info, &storage);
        match interp.run(&ep.function, fs.entry_info().unwrap(), Vec::new()).unwrap() {
            Outcome::Return(Some(v)) => v.components().unwrap().to_vec(),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    const PREFIX: &str = r#"
@vertex
fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p, 1.0);
}
"#;

    #[test]
    fn constant_color() {
        let src = format!(
            "{PREFIX}\n@fragment fn fs_main() -> @location(0) vec4<f32> {{ return vec4<f32>(1.0, 0.5, 0.2, 1.0); }}"
        );
        assert_eq!(run_fragment(&src, &[]), vec![1.0, 0.5, 0.2, 1.0]);
    }

    #[test]
    fn uniform_read_and_math() {
        let src = format!(
            r#"{PREFIX}
@group(0) @binding(0) var<uniform> ourColor: vec4<f32>;
@fragment
fn fs_main() -> @location(0) vec4<f32> {{
    var c = ourColor;
    c.x = clamp(c.x * 2.0, 0.0, 1.0);
    return c;
}}
"#
        );
        let out = run_fragment(&src, &[("ourColor", UniformValue::Vec4([0.25, 0.5, 0.0, 1.0]))]);
        assert_eq!(out, vec![0.5, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn branches_and_helper_calls() {
        let src = format!(
            r#"{PREFIX}
@group(0) @binding(0) var<uniform> flag: i32;
fn pick(on: bool) -> vec3<f32> {{
    if on {{
        return vec3<f32>(0.0, 1.0, 0.0);
    }}
    return vec3<f32>(1.0, 0.0, 0.0);
}}
@fragment
fn fs_main() -> @location(0) vec4<f32> {{
    return vec4<f32>(pick(flag != 0), 1.0);
}}
"#
        );
        assert_eq!(
            run_fragment(&src, &[("flag", UniformValue::Bool(true))]),
            vec![0.0, 1.0, 0.0, 1.0]
        );
        assert_eq!(
            run_fragment(&src, &[("flag", UniformValue::Bool(false))]),
            vec![1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn matrix_times_vector() {
        let m = [
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 3.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
        .map(|c| Value::Num(c.to_vec()));
        let out = binary(
            BinaryOperator::Multiply,
            Some(ScalarKind::Float),
            &Value::Composite(m.to_vec()),
            &Value::Num(vec![1.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        assert_eq!(out, Value::Num(vec![2.0, 3.0, 1.0, 1.0]));
    }

    #[test]
    fn integer_division_truncates() {
        let src = format!(
            r#"{PREFIX}
struct Params {{
    n: i32,
    m: u32,
}}
@group(0) @binding(0) var<uniform> u: Params;
@fragment
fn fs_main() -> @location(0) vec4<f32> {{
    let q = u.n / 2;
    let r = u.n % 4;
    let p = u.m / 3u;
    return vec4<f32>(f32(q) / 4.0, f32(r) / 4.0, f32(p) / 4.0, f32(-u.n / 2));
}}
"#
        );
        let out = run_fragment(
            &src,
            &[("n", UniformValue::Int(7)), ("m", UniformValue::Int(11))],
        );
        assert_eq!(out, vec![0.75, 0.75, 0.75, -3.0]);
    }

    #[test]
    fn float_division_keeps_fraction() {
        let out = binary(
            BinaryOperator::Divide,
            Some(ScalarKind::Float),
            &Value::scalar(7.0),
            &Value::scalar(2.0),
        )
        .unwrap();
        assert_eq!(out, Value::scalar(3.5));
        let out = binary(
            BinaryOperator::Divide,
            Some(ScalarKind::Sint),
            &Value::scalar(7.0),
            &Value::scalar(0.0),
        )
        .unwrap();
        assert_eq!(out, Value::scalar(7.0));
    }

    #[test]
    fn scalar_broadcasts_over_vector() {
        assert_eq!(
            zip(&[1.0, 2.0, 3.0], &[2.0], |a, b| a * b).unwrap(),
            Value::Num(vec![2.0, 4.0, 6.0])
        );
        assert!(zip(&[1.0, 2.0], &[1.0, 2.0, 3.0], |a, b| a + b).is_err());
    }

    #[test]
    fn empty_table_has_no_blocks() {
        let storage = UniformStorage::new(UniformTable::default());
        assert!(storage.table().blocks.is_empty());
    }
}
