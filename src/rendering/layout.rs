/// Layout: resolves a scenario's content size under its sizing strategy
/// and places the display tree inside it.
use crate::error::{Axis, Error, Result};
use crate::platform::{EdgeInsets, LayoutDirection, Size};
use crate::rendering::view::{Paint, StackAxis, View};
use crate::scenario::{ScenarioLayout, Sizing};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn inset(&self, insets: EdgeInsets) -> Rect {
        Rect::new(
            self.x + insets.left,
            self.y + insets.top,
            (self.width - insets.horizontal()).max(0.0),
            (self.height - insets.vertical()).max(0.0),
        )
    }

    /// A rect of `size` centered in `self`. Oversized content overflows
    /// symmetrically.
    pub fn center(&self, size: Size) -> Rect {
        Rect::new(
            self.x + (self.width - size.width) / 2.0,
            self.y + (self.height - size.height) / 2.0,
            size.width,
            size.height,
        )
    }
}

/// Environment values layout depends on.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEnv {
    pub safe_area: EdgeInsets,
    pub direction: LayoutDirection,
}

/// Size offered to a view; `None` asks for its ideal size on that axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl Proposal {
    pub fn exact(size: Size) -> Self {
        Self { width: Some(size.width), height: Some(size.height) }
    }
}

/// What a laid-out node draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoration {
    Fill(Paint),
    Stroke { paint: Paint, width: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub frame: Rect,
    pub decoration: Decoration,
}

/// Resolve the content bounds of a scenario inside a container.
///
/// `Compressed` takes the content's ideal size, `Fill` the container's,
/// `Fixed(l)` takes `l`. All three are clamped to the container, which is
/// what keeps oversized fixed requests on screen.
pub fn resolve_content_size(
    scenario: &str,
    location: (&'static str, u32),
    layout: ScenarioLayout,
    view: &View,
    container: Size,
    env: &LayoutEnv,
) -> Result<Size> {
    let proposal = Proposal {
        width: offered(layout.h, container.width),
        height: offered(layout.v, container.height),
    };
    let ideal = measure(view, proposal, env);
    let size = Size::new(
        resolve_axis(layout.h, ideal.width, container.width),
        resolve_axis(layout.v, ideal.height, container.height),
    );

    for (axis, length) in [(Axis::Horizontal, size.width), (Axis::Vertical, size.height)] {
        if !(length > 0.0) {
            return Err(Error::ZeroSizeLayout {
                scenario: scenario.to_string(),
                axis,
                file: location.0,
                line: location.1,
            });
        }
    }
    Ok(size)
}

fn offered(sizing: Sizing, container: f64) -> Option<f64> {
    match sizing {
        Sizing::Compressed => None,
        Sizing::Fill => Some(container),
        Sizing::Fixed(length) => Some(length.min(container)),
    }
}

fn resolve_axis(sizing: Sizing, ideal: f64, container: f64) -> f64 {
    match sizing {
        Sizing::Compressed => ideal.min(container),
        Sizing::Fill => container,
        Sizing::Fixed(length) => length.min(container),
    }
}

/// Size a view chooses for a proposal.
pub fn measure(view: &View, proposal: Proposal, env: &LayoutEnv) -> Size {
    match view {
        View::Empty => Size::default(),
        View::Color(_) => Size::new(proposal.width.unwrap_or(0.0), proposal.height.unwrap_or(0.0)),
        View::Rect { width, height, .. } => Size::new(*width, *height),
        View::Padding { insets, child } => padded(child, *insets, proposal, env),
        View::SafeArea(child) => padded(child, env.safe_area, proposal, env),
        View::Background { child, .. } | View::Border { child, .. } => measure(child, proposal, env),
        View::Frame { width, height, child } => {
            let inner = Proposal {
                width: width.or(proposal.width),
                height: height.or(proposal.height),
            };
            let child_size = measure(child, inner, env);
            Size::new(width.unwrap_or(child_size.width), height.unwrap_or(child_size.height))
        }
        View::Stack { axis, spacing, children } => {
            let (main, cross) = stack_extent(*axis, *spacing, children, proposal, env);
            match axis {
                StackAxis::Horizontal => Size::new(main, cross),
                StackAxis::Vertical => Size::new(cross, main),
            }
        }
        View::Slot(slot) => measure(&slot.get(), proposal, env),
    }
}

fn padded(child: &View, insets: EdgeInsets, proposal: Proposal, env: &LayoutEnv) -> Size {
    let inner = Proposal {
        width: proposal.width.map(|w| (w - insets.horizontal()).max(0.0)),
        height: proposal.height.map(|h| (h - insets.vertical()).max(0.0)),
    };
    let s = measure(child, inner, env);
    Size::new(s.width + insets.horizontal(), s.height + insets.vertical())
}

/// Whether a view grows with the space offered along `axis`.
fn is_flexible(view: &View, axis: StackAxis) -> bool {
    match view {
        View::Empty | View::Rect { .. } => false,
        View::Color(_) => true,
        View::Padding { child, .. }
        | View::SafeArea(child)
        | View::Background { child, .. }
        | View::Border { child, .. } => is_flexible(child, axis),
        View::Frame { width, height, child } => {
            let fixed = match axis {
                StackAxis::Horizontal => width.is_some(),
                StackAxis::Vertical => height.is_some(),
            };
            !fixed && is_flexible(child, axis)
        }
        View::Stack { children, .. } => children.iter().any(|c| is_flexible(c, axis)),
        View::Slot(slot) => is_flexible(&slot.get(), axis),
    }
}

fn split(axis: StackAxis, proposal: Proposal) -> (Option<f64>, Option<f64>) {
    match axis {
        StackAxis::Horizontal => (proposal.width, proposal.height),
        StackAxis::Vertical => (proposal.height, proposal.width),
    }
}

fn join(axis: StackAxis, main: Option<f64>, cross: Option<f64>) -> Proposal {
    match axis {
        StackAxis::Horizontal => Proposal { width: main, height: cross },
        StackAxis::Vertical => Proposal { width: cross, height: main },
    }
}

fn main_of(axis: StackAxis, s: Size) -> f64 {
    match axis {
        StackAxis::Horizontal => s.width,
        StackAxis::Vertical => s.height,
    }
}

fn cross_of(axis: StackAxis, s: Size) -> f64 {
    match axis {
        StackAxis::Horizontal => s.height,
        StackAxis::Vertical => s.width,
    }
}

/// Main-axis length of every child. Rigid children keep their ideal
/// length; flexible ones share what is left of the offered main length.
fn stack_lengths(
    axis: StackAxis,
    spacing: f64,
    children: &[View],
    proposal: Proposal,
    env: &LayoutEnv,
) -> Vec<f64> {
    let (main, cross) = split(axis, proposal);
    let mut lengths: Vec<f64> = children
        .iter()
        .map(|c| main_of(axis, measure(c, join(axis, None, cross), env)))
        .collect();

    let flexible: Vec<usize> = (0..children.len())
        .filter(|&i| is_flexible(&children[i], axis))
        .collect();
    if let (Some(main), false) = (main, flexible.is_empty()) {
        let gaps = spacing * children.len().saturating_sub(1) as f64;
        let rigid: f64 = (0..children.len())
            .filter(|i| !flexible.contains(i))
            .map(|i| lengths[i])
            .sum();
        let share = ((main - gaps - rigid) / flexible.len() as f64).max(0.0);
        for i in flexible {
            lengths[i] = share;
        }
    }
    lengths
}

fn stack_extent(
    axis: StackAxis,
    spacing: f64,
    children: &[View],
    proposal: Proposal,
    env: &LayoutEnv,
) -> (f64, f64) {
    if children.is_empty() {
        return (0.0, 0.0);
    }
    let (_, cross) = split(axis, proposal);
    let lengths = stack_lengths(axis, spacing, children, proposal, env);
    let main = lengths.iter().sum::<f64>() + spacing * (children.len() - 1) as f64;
    let cross_len = children
        .iter()
        .zip(&lengths)
        .map(|(c, len)| cross_of(axis, measure(c, join(axis, Some(*len), cross), env)))
        .fold(0.0, f64::max);
    (main, cross_len)
}

/// Place `view` inside `frame`, appending drawable nodes in paint order.
pub fn place(view: &View, frame: Rect, env: &LayoutEnv, out: &mut Vec<LayoutNode>) {
    if let View::Slot(slot) = view {
        return place(&slot.get(), frame, env, out);
    }
    let rect = frame.center(measure(view, Proposal::exact(frame.size()), env));
    match view {
        View::Empty | View::Slot(_) => {}
        View::Color(paint) | View::Rect { paint, .. } => out.push(LayoutNode {
            frame: rect,
            decoration: Decoration::Fill(*paint),
        }),
        View::Padding { insets, child } => place(child, rect.inset(*insets), env, out),
        View::SafeArea(child) => place(child, rect.inset(env.safe_area), env, out),
        View::Background { paint, child } => {
            out.push(LayoutNode { frame: rect, decoration: Decoration::Fill(*paint) });
            place(child, rect, env, out);
        }
        View::Border { paint, width, child } => {
            place(child, rect, env, out);
            out.push(LayoutNode {
                frame: rect,
                decoration: Decoration::Stroke { paint: *paint, width: *width },
            });
        }
        View::Frame { child, .. } => place(child, rect, env, out),
        View::Stack { axis, spacing, children } => {
            let lengths = stack_lengths(*axis, *spacing, children, Proposal::exact(rect.size()), env);
            let mirrored = *axis == StackAxis::Horizontal && env.direction == LayoutDirection::RightToLeft;
            let mut offset = 0.0;
            for (child, len) in children.iter().zip(lengths) {
                let slot = match axis {
                    StackAxis::Horizontal if mirrored => {
                        Rect::new(rect.x + rect.width - offset - len, rect.y, len, rect.height)
                    }
                    StackAxis::Horizontal => Rect::new(rect.x + offset, rect.y, len, rect.height),
                    StackAxis::Vertical => Rect::new(rect.x, rect.y + offset, rect.width, len),
                };
                place(child, slot, env, out);
                offset += len + spacing;
            }
        }
    }
}
