//! Smoothing-group assignment

use super::{DisplayList, MainContext, ParamArchive, Tool, ToolKind, ToolResponse, Transaction};
use crate::errors::DesignerError;
use crate::float_types::Real;
use crate::model::{Model, PolygonId};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Prefix of automatically named groups.
pub const AUTO_GROUP_PREFIX: &str = "SmoothingGroup_";

/// Partition `ids` into smoothing groups by flood fill.
///
/// A group grows across shared edges to every polygon whose normal is
/// within `angle_threshold` degrees of any polygon already in the group.
/// Every input polygon lands in exactly one group.
#[instrument(skip(model, ids), fields(polygons = ids.len()))]
pub fn auto_smooth(model: &Model, ids: &[PolygonId], angle_threshold: Real) -> Vec<Vec<PolygonId>> {
    let cos_limit = angle_threshold.to_radians().cos();
    let candidates: Vec<PolygonId> = ids.iter().copied().filter(|id| model.contains(*id)).collect();
    let mut used: BTreeSet<PolygonId> = BTreeSet::new();
    let mut groups = Vec::new();

    for seed in &candidates {
        if !used.insert(*seed) {
            continue;
        }
        let mut group = vec![*seed];
        let mut frontier = vec![*seed];
        while let Some(current) = frontier.pop() {
            let Some(polygon) = model.polygon(current) else {
                continue;
            };
            for (a, b) in polygon.edges() {
                for neighbour in model.query_polygons_sharing_edge(&a, &b) {
                    if used.contains(&neighbour) || !candidates.contains(&neighbour) {
                        continue;
                    }
                    let Some(n) = model.polygon(neighbour).map(|p| p.normal()) else {
                        continue;
                    };
                    let close = group
                        .iter()
                        .filter_map(|member| model.polygon(*member))
                        .any(|member| member.normal().dot(&n) > cos_limit);
                    if close {
                        used.insert(neighbour);
                        group.push(neighbour);
                        frontier.push(neighbour);
                    }
                }
            }
        }
        groups.push(group);
    }
    debug!(groups = groups.len(), "auto smooth");
    groups
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Flood-fill groups by angle rather than assigning the selection to one group
    pub auto: bool,
    /// Degrees; `None` takes the session default
    pub angle_threshold: Option<Real>,
    /// Target group for manual assignment; a fresh name when `None`
    pub group_name: Option<String>,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        SmoothingParams {
            auto: true,
            angle_threshold: None,
            group_name: None,
        }
    }
}

/// One-shot: groups the selected faces (all live faces when none are
/// selected in auto mode) and commits on enter.
#[derive(Debug, Default)]
pub struct SmoothingGroupTool {
    pub params: SmoothingParams,
}

impl Tool for SmoothingGroupTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SmoothingGroup
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        let mut faces = ctx.selection.face_ids();
        if faces.is_empty() && self.params.auto {
            faces = ctx.model.live_polygons().map(|(id, _)| id).collect();
        }
        if faces.is_empty() {
            return Err(DesignerError::NotEnoughSelection {
                tool: ToolKind::SmoothingGroup,
                what: "faces",
                required: 1,
                found: 0,
            });
        }

        let mut tx = Transaction::begin(ctx, "Smoothing Group");
        let groups = if self.params.auto {
            let angle = self.params.angle_threshold.unwrap_or(ctx.config.smoothing_angle);
            auto_smooth(&ctx.model, &faces, angle)
        } else {
            vec![faces]
        };
        let name = self.params.group_name.clone().filter(|_| !self.params.auto);
        tx.touch();
        Ok(tx.commit_with(ctx, |model| {
            let smoothing = model.smoothing_groups_mut();
            for group in groups {
                let name = match &name {
                    Some(name) => name.clone(),
                    None => smoothing.next_free_name(AUTO_GROUP_PREFIX),
                };
                smoothing.add_polygons(&name, group);
            }
        }))
    }

    fn leave(&mut self, _ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        Ok(ToolResponse::Continue)
    }

    fn cancel(&mut self, _ctx: &mut MainContext) -> ToolResponse {
        ToolResponse::Cancelled
    }

    fn display(&self, _ctx: &MainContext, _out: &mut DisplayList) {}

    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        archive.value(ToolKind::SmoothingGroup.name(), &mut self.params)?;
        Ok(())
    }
}
