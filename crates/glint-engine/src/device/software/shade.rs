//! Runs linked programs per vertex and per fragment through the interpreter.

use naga::{Binding, BuiltIn, Handle, Interpolation, Module, Type, TypeInner};

use super::interp::{EvalResult, Interpreter, Outcome, Value, component_count};
use crate::coords::Color;
use crate::device::objects::LinkedProgram;
use crate::vertex::{VertexAttribute, VertexLayout};

/// Output of one vertex invocation.
#[derive(Debug, Clone)]
pub(crate) struct ShadedVertex {
    pub clip: [f32; 4],
    /// User outputs by location.
    pub varyings: Vec<(u32, Vec<f32>)>,
}

impl ShadedVertex {
    fn varying(&self, location: u32) -> Option<&[f32]> {
        self.varyings
            .iter()
            .find(|(l, _)| *l == location)
            .map(|(_, v)| v.as_slice())
    }
}

/// Attribute defaults for components the buffer does not provide.
const DEFAULT_COMPONENTS: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn fit(mut v: Vec<f32>, n: usize) -> Vec<f32> {
    v.truncate(n);
    while v.len() < n {
        v.push(DEFAULT_COMPONENTS[v.len()]);
    }
    v
}

fn read_attribute(bytes: &[u8], attr: &VertexAttribute) -> EvalResult<Vec<f32>> {
    use crate::shader::IoScalar;

    (0..attr.format.components() as usize)
        .map(|i| {
            let o = attr.offset as usize + 4 * i;
            let raw: [u8; 4] = bytes
                .get(o..o + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or("attribute read out of bounds")?;
            Ok(match attr.format.scalar() {
                IoScalar::Float => f32::from_le_bytes(raw),
                IoScalar::Uint => u32::from_le_bytes(raw) as f32,
                IoScalar::Sint => i32::from_le_bytes(raw) as f32,
                IoScalar::Bool => (u32::from_le_bytes(raw) != 0) as u8 as f32,
            })
        })
        .collect()
}

/// Builds one entry point argument, descending into struct arguments.
fn gather(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    source: &mut dyn FnMut(&Binding, usize) -> EvalResult<Value>,
) -> EvalResult<Value> {
    match binding {
        Some(b) => source(b, component_count(module, ty).unwrap_or(4)),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .map(|m| gather(module, m.ty, m.binding.as_ref(), source))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Composite),
            _ => Err("entry point argument without binding".into()),
        },
    }
}

/// Routes an entry point result to `sink`, descending into struct results.
fn scatter(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    value: Value,
    sink: &mut dyn FnMut(&Binding, Value) -> EvalResult<()>,
) -> EvalResult<()> {
    match binding {
        Some(b) => sink(b, value),
        None => match (&module.types[ty].inner, value) {
            (TypeInner::Struct { members, .. }, Value::Composite(items)) => {
                for (m, v) in members.iter().zip(items) {
                    scatter(module, m.ty, m.binding.as_ref(), v, sink)?;
                }
                Ok(())
            }
            _ => Err("entry point result without binding".into()),
        },
    }
}

pub(crate) fn shade_vertex(
    program: &LinkedProgram,
    layout: &VertexLayout,
    vertex: &[u8],
    index: u32,
) -> EvalResult<ShadedVertex> {
    let stage = &program.vertex;
    let module = &stage.module;
    let ep = stage.entry().ok_or("vertex entry point missing")?;
    let ep_info = stage.entry_info().ok_or("vertex entry point missing")?;

    let mut source = |binding: &Binding, n: usize| -> EvalResult<Value> {
        match binding {
            Binding::Location { location, .. } => {
                let attr = layout
                    .attribute(*location)
                    .ok_or_else(|| format!("no attribute bound at location {location}"))?;
                Ok(Value::Num(fit(read_attribute(vertex, attr)?, n)))
            }
            Binding::BuiltIn(BuiltIn::VertexIndex) => Ok(Value::scalar(index as f32)),
            Binding::BuiltIn(BuiltIn::InstanceIndex) => Ok(Value::scalar(0.0)),
            Binding::BuiltIn(b) => Err(format!("unsupported vertex builtin {b:?}")),
        }
    };
    let args = ep
        .function
        .arguments
        .iter()
        .map(|a| gather(module, a.ty, a.binding.as_ref(), &mut source))
        .collect::<EvalResult<Vec<_>>>()?;

    let mut interp = Interpreter::new(module, &stage.info, &program.uniforms);
    let out = match interp.run(&ep.function, ep_info, args)? {
        Outcome::Return(Some(v)) => v,
        _ => return Err("vertex stage produced no output".into()),
    };
    let result = ep.function.result.as_ref().ok_or("vertex stage has no result")?;

    let mut shaded = ShadedVertex {
        clip: DEFAULT_COMPONENTS,
        varyings: Vec::new(),
    };
    scatter(module, result.ty, result.binding.as_ref(), out, &mut |b, v| {
        match b {
            Binding::BuiltIn(BuiltIn::Position { .. }) => {
                let c = fit(v.components()?.to_vec(), 4);
                shaded.clip = [c[0], c[1], c[2], c[3]];
            }
            Binding::Location { location, .. } => {
                shaded.varyings.push((*location, v.components()?.to_vec()));
            }
            Binding::BuiltIn(_) => {}
        }
        Ok(())
    })?;

    Ok(shaded)
}

/// True when the fragment stage reads no per-fragment inputs, so one
/// invocation per draw gives the color of every covered pixel.
pub(crate) fn fragment_is_constant(program: &LinkedProgram) -> bool {
    program
        .fragment
        .entry()
        .is_some_and(|ep| ep.function.arguments.is_empty())
}

/// Barycentric weights plus window position of one fragment.
#[derive(Debug, Copy, Clone)]
pub(crate) struct FragmentInput<'v> {
    pub vertices: [&'v ShadedVertex; 3],
    pub weights: [f32; 3],
    pub coord: [f32; 4],
}

impl FragmentInput<'_> {
    fn varying(&self, location: u32, flat: bool, n: usize) -> Vec<f32> {
        let values: Vec<&[f32]> = self
            .vertices
            .iter()
            .filter_map(|v| v.varying(location))
            .collect();
        if values.len() != 3 {
            return vec![0.0; n];
        }
        if flat {
            return fit(values[0].to_vec(), n);
        }
        let len = values[0].len();
        let out = (0..len)
            .map(|i| {
                (0..3)
                    .map(|k| values[k].get(i).copied().unwrap_or(0.0) * self.weights[k])
                    .sum()
            })
            .collect();
        fit(out, n)
    }
}

/// Shades one fragment. `Ok(None)` means the fragment was discarded.
pub(crate) fn shade_fragment(
    program: &LinkedProgram,
    input: Option<&FragmentInput<'_>>,
) -> EvalResult<Option<Color>> {
    let stage = &program.fragment;
    let module = &stage.module;
    let ep = stage.entry().ok_or("fragment entry point missing")?;
    let ep_info = stage.entry_info().ok_or("fragment entry point missing")?;

    let mut source = |binding: &Binding, n: usize| -> EvalResult<Value> {
        let input = input.ok_or("fragment input requested for a constant shader")?;
        match binding {
            Binding::Location {
                location,
                interpolation,
                ..
            } => Ok(Value::Num(input.varying(
                *location,
                *interpolation == Some(Interpolation::Flat),
                n,
            ))),
            Binding::BuiltIn(BuiltIn::Position { .. }) => Ok(Value::Num(input.coord.to_vec())),
            Binding::BuiltIn(BuiltIn::FrontFacing) => Ok(Value::scalar(1.0)),
            Binding::BuiltIn(b) => Err(format!("unsupported fragment builtin {b:?}")),
        }
    };
    let args = ep
        .function
        .arguments
        .iter()
        .map(|a| gather(module, a.ty, a.binding.as_ref(), &mut source))
        .collect::<EvalResult<Vec<_>>>()?;

    let mut interp = Interpreter::new(module, &stage.info, &program.uniforms);
    let out = match interp.run(&ep.function, ep_info, args)? {
        Outcome::Discard => return Ok(None),
        Outcome::Return(Some(v)) => v,
        Outcome::Return(None) => return Err("fragment stage produced no output".into()),
    };
    let result = ep.function.result.as_ref().ok_or("fragment stage has no result")?;

    let mut color = None;
    scatter(module, result.ty, result.binding.as_ref(), out, &mut |b, v| {
        if let Binding::Location { location: 0, .. } = b {
            let c = fit(v.components()?.to_vec(), 4);
            color = Some(Color::new(c[0], c[1], c[2], c[3]));
        }
        Ok(())
    })?;

    color
        .map(Some)
        .ok_or_else(|| "fragment stage writes no location 0 output".into())
}
