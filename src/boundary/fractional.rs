use crate::boundary::*;

/// Velocity constraint for sub-cell collider geometry: faces fully inside
/// the collider take the collider velocity, the fluid velocity is
/// extrapolated into the collider and projected onto its surface.
#[derive(Default)]
pub struct FractionalBoundaryConditionSolver<const D: usize> {
    fields: ColliderFields<D>,
}

impl<const D: usize> FractionalBoundaryConditionSolver<D> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<const D: usize> BoundaryConditionSolver<D> for FractionalBoundaryConditionSolver<D> {
    fn fields(&self) -> &ColliderFields<D> {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut ColliderFields<D> {
        &mut self.fields
    }

    fn constrain_velocity(&mut self, velocity: &mut FaceCenteredGrid<D>, extrapolation_depth: usize) {
        if self.fields.sdf().resolution() != velocity.resolution() {
            let collider = self.fields.collider().cloned();
            self.fields.update(collider, velocity.shape());
        }
        constrain_to_collider(&self.fields, velocity, extrapolation_depth);
        self.fields.apply_closed_domain_boundaries(velocity);
    }
}

pub(crate) fn constrain_to_collider<const D: usize>(
    fields: &ColliderFields<D>,
    velocity: &mut FaceCenteredGrid<D>,
    extrapolation_depth: usize,
) {
    let spacing = velocity.shape().spacing;
    let sdf = fields.sdf();
    let collider_velocity = fields.velocity();

    for axis in 0..D {
        let origin = *velocity.component_origin(axis);
        let mut offset = Vector::<D>::zeros();
        offset[axis] = 0.5 * spacing[axis];
        let component = velocity.component_mut(axis);

        let mut valid = Array::new(component.size(), true);
        valid.par_for_each_index_mut(|index, valid| {
            let point = origin + spacing.component_mul(&to_vector(&index));
            let fraction =
                fraction_inside_sdf(sdf.sample(&(point - offset)), sdf.sample(&(point + offset)));
            *valid = 1.0 - fraction.clamp(0.0, 1.0) > 0.0;
        });
        component.par_for_each_index_mut(|index, value| {
            if !valid[index] {
                let point = origin + spacing.component_mul(&to_vector(&index));
                *value = collider_velocity.sample(&point)[axis];
            }
        });

        let input = component.clone();
        extrapolate_to_region(&input, &valid, extrapolation_depth, component);
    }

    let friction_coefficient = fields.friction_coefficient();
    let extrapolated = velocity.clone();
    for axis in 0..D {
        let origin = *extrapolated.component_origin(axis);
        velocity
            .component_mut(axis)
            .par_for_each_index_mut(|index, value| {
                let point = origin + spacing.component_mul(&to_vector(&index));
                if !is_inside_sdf(sdf.sample(&point)) {
                    return;
                }
                let surface_velocity = collider_velocity.sample(&point);
                let gradient = sdf.gradient(&point);
                *value = if gradient.norm_squared() > 0.0 {
                    let normal = gradient.normalize();
                    let relative = extrapolated.sample(&point) - surface_velocity;
                    (project_and_apply_friction(&relative, &normal, friction_coefficient)
                        + surface_velocity)[axis]
                } else {
                    surface_velocity[axis]
                };
            });
    }
}
