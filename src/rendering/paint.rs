/// Paint commands: laid-out nodes converted to device pixels
use crate::platform::Appearance;
use crate::rendering::layout::{Decoration, LayoutNode, Rect};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
}

/// Convert nodes to pixel-space commands. Edges are rounded independently
/// so adjacent rects never overlap or leave gaps.
pub fn paint_nodes(nodes: &[LayoutNode], scale: f64, appearance: Appearance) -> Vec<PaintCommand> {
    let mut commands = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node.decoration {
            Decoration::Fill(paint) => {
                let c = paint.resolve(appearance);
                push_rect(&mut commands, node.frame, scale, (c.0, c.1, c.2, c.3));
            }
            Decoration::Stroke { paint, width } => {
                let c = paint.resolve(appearance);
                let rgba = (c.0, c.1, c.2, c.3);
                let f = node.frame;
                let w = width.min(f.width / 2.0).min(f.height / 2.0).max(0.0);
                push_rect(&mut commands, Rect::new(f.x, f.y, f.width, w), scale, rgba);
                push_rect(&mut commands, Rect::new(f.x, f.y + f.height - w, f.width, w), scale, rgba);
                push_rect(&mut commands, Rect::new(f.x, f.y + w, w, f.height - 2.0 * w), scale, rgba);
                push_rect(
                    &mut commands,
                    Rect::new(f.x + f.width - w, f.y + w, w, f.height - 2.0 * w),
                    scale,
                    rgba,
                );
            }
        }
    }
    commands
}

fn push_rect(out: &mut Vec<PaintCommand>, r: Rect, scale: f64, rgba: (u8, u8, u8, u8)) {
    if rgba.3 == 0 {
        return;
    }
    let x0 = (r.x * scale).round() as i64;
    let y0 = (r.y * scale).round() as i64;
    let x1 = ((r.x + r.width) * scale).round() as i64;
    let y1 = ((r.y + r.height) * scale).round() as i64;
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    out.push(PaintCommand::SolidRect {
        x: x0.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        y: y0.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        width: (x1 - x0).min(u32::MAX as i64) as u32,
        height: (y1 - y0).min(u32::MAX as i64) as u32,
        rgba,
    });
}
