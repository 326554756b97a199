//! Case driver: a tank of fluid under gravity with a flat free surface,
//! optionally stirred by a moving sphere. Every step advects the velocity,
//! adds gravity, constrains it at the solids and projects it, until the
//! velocity settles or the step limit is reached.

use crate::advection::{AdvectionSolver, SemiLagrangian};
use crate::boundary::{extrapolate_to_region, is_inside_sdf, BoundaryConditionSolver, BoundaryScheme};
use crate::collider::{Collider, SphereCollider};
use crate::error::{parse_or, parse_required, ParameterError};
use crate::fdm::FdmVector;
use crate::field::*;
use crate::global_variables::*;
use crate::grid::*;
use crate::io::{self, WriteDataMode};
use crate::pressure::fractional::FractionalSinglePhasePressureSolver;
use crate::pressure::{GridPressureSolver, SinglePhasePressureSolver};
use crate::solver::multigrid::MgParameters;
use crate::solver::{SolverKind, SolverParameters};
use anyhow::Context;
use colored::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Flat fluid surface normal to the y axis; negative below `height`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreeSurface {
    pub height: Float,
}

impl<const D: usize> ScalarField<D> for FreeSurface {
    fn sample(&self, point: &Vector<D>) -> Float {
        point[1] - self.height
    }

    fn gradient(&self, _point: &Vector<D>) -> Vector<D> {
        let mut gradient = Vector::<D>::zeros();
        gradient[1] = 1.0;
        gradient
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Residuals {
    /// Largest change of a face velocity over the step.
    pub velocity_change: Float,
    /// Largest cell divergence inside the fluid after projection.
    pub divergence: Float,
    pub pressure_residual: Float,
    pub pressure_iterations: usize,
}

#[derive(Clone, Debug)]
pub struct Simulation<const D: usize> {
    pub case_name: String,
    pub time_step: usize,
    pub simulation_time: Instant,
    pub resolution: [usize; D],
    pub grid_spacing: Float,
    pub dt: Float,
    pub gravity: Float,
    /// Free surface height as a fraction of the domain height.
    pub fluid_height: Float,
    pub sphere: Option<SphereCollider<D>>,
    pub boundary_scheme: BoundaryScheme,
    pub solver_kind: SolverKind,
    pub solver_parameters: SolverParameters,
    pub mg_parameters: MgParameters,
    pub use_compressed: bool,
    pub extrapolation_depth: usize,
    pub tolerance: Float,
    pub min_iter: usize,
    pub max_iter: usize,
    pub write_data_mode: WriteDataMode,
}

/// Contents of the `case_setup.jou` written when the case has none.
pub fn default_case_setup<const D: usize>() -> String {
    let resolution = vec!["32"; D].join(" ");
    let mut center = vec!["0.5"; D];
    center[1] = "0.35";
    let center = center.join(" ");
    let velocity = vec!["0.0"; D].join(" ");
    format!(
        r#"# Tank under gravity with an optional sphere collider.
case_name = {CASE_NAME}
resolution = {resolution}
grid_spacing = 0.03125
dt = 0.01
gravity = {GRAVITY}
fluid_height = 0.6

# A zero radius removes the sphere.
sphere_center = {center}
sphere_radius = 0.15
sphere_velocity = {velocity}

# blocked or fractional
boundary_scheme = fractional
compressed = false
extrapolation_depth = {DEFAULT_EXTRAPOLATION_DEPTH}

# jacobi, gauss_seidel, cg, mg or mgpcg
solver = mgpcg
max_iterations = {MAX_ITER}
tolerance = {TOLERANCE}
mg_levels = {MAX_NUMBER_OF_LEVELS}

steady_tolerance = 1e-4
min_iter = {MIN_STEP}
max_iter = {MAX_STEP}
write_data_mode = frequency 100
"#
    )
}

fn parse_components<T: std::str::FromStr, const D: usize>(
    parameters: &HashMap<String, String>,
    key: &str,
) -> Result<[T; D], ParameterError> {
    let value = parameters
        .get(key)
        .ok_or_else(|| ParameterError::MissingKey(key.to_string()))?;
    let invalid = || ParameterError::InvalidValue {
        key: key.to_string(),
        value: value.clone(),
    };
    let components = value
        .split_whitespace()
        .map(|component| component.parse::<T>())
        .collect::<Result<Vec<T>, _>>()
        .map_err(|_| invalid())?;
    components.try_into().map_err(|_| invalid())
}

fn parse_vector<const D: usize>(
    parameters: &HashMap<String, String>,
    key: &str,
) -> Result<Vector<D>, ParameterError> {
    parse_components::<Float, D>(parameters, key).map(Vector::<D>::from)
}

impl<const D: usize> Simulation<D> {
    pub fn from_setup(parameters: &HashMap<String, String>) -> Result<Self, ParameterError> {
        let resolution = match parse_components::<usize, D>(parameters, "resolution") {
            Ok(resolution) if resolution.iter().all(|&n| n > 0) => resolution,
            Ok(resolution) => return Err(ParameterError::InvalidResolution(resolution.to_vec())),
            Err(ParameterError::InvalidValue { key, value }) => {
                // Well-formed numbers with the wrong count are a resolution error.
                let counts = value
                    .split_whitespace()
                    .map(|n| n.parse::<usize>())
                    .collect::<Result<Vec<usize>, _>>();
                return Err(match counts {
                    Ok(resolution) => ParameterError::InvalidResolution(resolution),
                    Err(_) => ParameterError::InvalidValue { key, value },
                });
            }
            Err(e) => return Err(e),
        };

        let positive = |key: &str, value: Float| {
            if value > 0.0 && value.is_finite() {
                Ok(value)
            } else {
                Err(ParameterError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
        };
        let grid_spacing = positive("grid_spacing", parse_required(parameters, "grid_spacing")?)?;
        let dt = positive("dt", parse_or(parameters, "dt", 0.01)?)?;

        let sphere_radius: Float = parse_or(parameters, "sphere_radius", 0.0)?;
        let sphere = if sphere_radius > 0.0 {
            let center = parse_vector::<D>(parameters, "sphere_center")?;
            let velocity = if parameters.contains_key("sphere_velocity") {
                parse_vector::<D>(parameters, "sphere_velocity")?
            } else {
                Vector::<D>::zeros()
            };
            Some(SphereCollider::new(center, sphere_radius).with_velocity(velocity))
        } else {
            None
        };

        let min_iter = parse_or(parameters, "min_iter", MIN_STEP)?;
        let max_iter = parse_or(parameters, "max_iter", MAX_STEP)?;
        if max_iter == 0 {
            return Err(ParameterError::ZeroIterations("time steps"));
        }

        Ok(Self {
            case_name: parse_required(parameters, "case_name")?,
            time_step: 0,
            simulation_time: Instant::now(),
            resolution,
            grid_spacing,
            dt,
            gravity: parse_or(parameters, "gravity", GRAVITY)?,
            fluid_height: parse_or(parameters, "fluid_height", 0.6)?,
            sphere,
            boundary_scheme: parse_or(parameters, "boundary_scheme", BoundaryScheme::Fractional)?,
            solver_kind: parse_or(parameters, "solver", SolverKind::MultigridPcg)?,
            solver_parameters: SolverParameters::from_setup(parameters)?,
            mg_parameters: MgParameters::from_setup(parameters)?,
            use_compressed: parse_or(parameters, "compressed", false)?,
            extrapolation_depth: parse_or(
                parameters,
                "extrapolation_depth",
                DEFAULT_EXTRAPOLATION_DEPTH,
            )?,
            tolerance: positive("steady_tolerance", parse_or(parameters, "steady_tolerance", 1e-4)?)?,
            min_iter,
            max_iter,
            write_data_mode: parse_or(parameters, "write_data_mode", WriteDataMode::Frequency(100))?,
        })
    }

    pub fn build_case_setup() -> anyhow::Result<Self> {
        io::create_case_directories().context("while creating the case directories")?;
        let case_setup_path = Path::new(io::PRE_PROCESSING_PATH).join(io::CASE_SETUP_FILE);
        if !case_setup_path.exists() {
            io::write_case_setup(&default_case_setup::<D>())
                .context("while writing the default case setup file")?;
        }
        println!(
            "Reading the case setup file: {}.\n",
            case_setup_path.display().to_string().yellow().bold()
        );
        let parameters = io::read_case_setup().context("while reading the case setup file")?;
        let simulation = Self::from_setup(&parameters).context("invalid case setup")?;
        simulation
            .create_script_for_residuals_graph()
            .context("while creating the residuals graph script")?;
        Ok(simulation)
    }

    pub fn next_step(&mut self) {
        self.time_step += 1;
    }

    pub fn stop_condition(&self, residuals: &Residuals) -> bool {
        let converged = residuals.velocity_change <= self.tolerance;
        let min_iterations = self.time_step > self.min_iter;
        let max_iterations = self.time_step >= self.max_iter;
        (min_iterations && converged) || max_iterations
    }

    pub fn print_residuals(&self, residuals: &Residuals) {
        if self.time_step % 100 == 0 {
            let duration = self.simulation_time.elapsed().as_secs_f64();
            println!("\n{} {:.2} s.", "Elapsed time:".cyan().bold(), duration);
            println!(
                "\n{:>8} {:>16} {:>16} {:>16} {:>10}\n",
                "step".cyan().bold(),
                "velocity".cyan().bold(),
                "divergence".cyan().bold(),
                "pressure".cyan().bold(),
                "iter".cyan().bold()
            );
        }
        println!(
            "{:>8} {:>16.8e} {:>16.8e} {:>16.8e} {:>10}",
            self.time_step,
            residuals.velocity_change,
            residuals.divergence,
            residuals.pressure_residual,
            residuals.pressure_iterations
        );
    }

    pub fn write_residuals(&self, residuals: &Residuals) -> std::io::Result<()> {
        let path = Path::new(io::DATA_PATH).join(io::RESIDUALS_FILE);
        io::append_table_row(
            &path,
            self.time_step,
            &[
                ("velocity", residuals.velocity_change),
                ("divergence", residuals.divergence),
                ("pressure", residuals.pressure_residual),
                ("iterations", residuals.pressure_iterations as Float),
            ],
        )
    }

    pub fn write_data(&self, domain: &FluidDomain<D>) -> anyhow::Result<()> {
        if self.write_data_mode.is_output_step(self.time_step) {
            self.write_data_from_steps(domain)?;
        }
        Ok(())
    }

    pub fn write_data_from_steps(&self, domain: &FluidDomain<D>) -> anyhow::Result<()> {
        let step_path = Path::new(io::DATA_PATH).join(self.time_step.to_string());
        fs::create_dir_all(&step_path)
            .with_context(|| format!("while creating the step {} directory", self.time_step))?;

        println!(
            "\nWriting {} for time step {}.\n",
            io::PRESSURE_FILE.yellow().bold(),
            self.time_step.to_string().yellow().bold()
        );
        let pressure = domain.pressure();
        write_cell_data(&step_path.join(io::PRESSURE_FILE), domain.shape(), |index| {
            vec![pressure.get(&index).copied().unwrap_or(0.0)]
        })
        .context("while writing the pressure file")?;

        println!(
            "\nWriting {} for time step {}.\n",
            io::VELOCITY_FILE.yellow().bold(),
            self.time_step.to_string().yellow().bold()
        );
        let velocity = domain.velocity();
        write_cell_data(&step_path.join(io::VELOCITY_FILE), domain.shape(), |index| {
            velocity.value_at_cell_center(&index).iter().copied().collect()
        })
        .context("while writing the velocity file")?;
        Ok(())
    }

    fn create_script_for_residuals_graph(&self) -> std::io::Result<()> {
        let path = Path::new(io::POST_PROCESSING_PATH).join(io::RESIDUALS_GRAPH_FILE);
        let mut file = File::create(&path)?;
        println!(
            "Creating the residuals graph script file: {}.\n",
            path.display().to_string().yellow().bold()
        );
        writeln!(
            file,
            r#"set title "{case_name}"
    set ylabel "Residuals"
    set xlabel "Time steps"
    set grid
    set logscale y
    set yrange [{min_tolerance}:]
    set ytics format "%L"
    set mxtics 5
    set terminal push
    set terminal pngcairo font "courier"
    set output "fig_{case_name_prefix}_residuals.png"
    plot "../data/residuals.dat" u 1:2 t "velocity change" w l,\
    "" u 1:3 t "divergence" w l,\
    "" u 1:4 t "pressure" w l
    set terminal pdfcairo font "courier"
    set output "fig_{case_name_prefix}_residuals.pdf"
    replot
    set terminal pop
    set output"#,
            case_name = self.case_name,
            min_tolerance = self.solver_parameters.tolerance.min(self.tolerance),
            case_name_prefix = self.case_name.replace(' ', "_").to_lowercase(),
        )?;
        Ok(())
    }
}

/// One line per cell: the cell center followed by `values(index)`.
fn write_cell_data<const D: usize, F>(path: &Path, shape: &GridShape<D>, values: F) -> std::io::Result<()>
where
    F: Fn([usize; D]) -> Vec<Float>,
{
    let mut file = BufWriter::new(File::create(path)?);
    for l in 0..shape.number_of_cells() {
        let index = unravel(&shape.resolution, l);
        for coordinate in shape.cell_center(&index).iter() {
            write!(file, " {:>16.8e}", coordinate)?;
        }
        for value in values(index) {
            write!(file, " {:>16.8e}", value)?;
        }
        writeln!(file)?;
    }
    file.flush()
}

/// The fluid state and the solvers that advance it.
pub struct FluidDomain<const D: usize> {
    shape: GridShape<D>,
    velocity: FaceCenteredGrid<D>,
    pressure_solver: Box<dyn GridPressureSolver<D>>,
    boundary_solver: Box<dyn BoundaryConditionSolver<D>>,
    advection: SemiLagrangian,
    free_surface: FreeSurface,
    sphere: Option<SphereCollider<D>>,
}

impl<const D: usize> FluidDomain<D> {
    pub fn new(simulation: &Simulation<D>) -> Self {
        let shape = GridShape::uniform(simulation.resolution, simulation.grid_spacing);
        let mut pressure_solver: Box<dyn GridPressureSolver<D>> = match simulation.boundary_scheme {
            BoundaryScheme::Blocked => Box::new(SinglePhasePressureSolver::new()),
            BoundaryScheme::Fractional => Box::new(FractionalSinglePhasePressureSolver::new()),
        };
        pressure_solver.set_linear_system_solver(
            simulation
                .solver_kind
                .build(simulation.solver_parameters, simulation.mg_parameters),
        );

        let mut boundary_solver = pressure_solver.suggested_boundary_condition_solver();
        let collider = simulation
            .sphere
            .map(|sphere| Arc::new(sphere) as Arc<dyn Collider<D>>);
        boundary_solver.update_collider(collider, &shape);

        log::info!(
            "{} boundaries, {} pressure solver on a {:?} grid",
            simulation.boundary_scheme,
            simulation.solver_kind,
            shape.resolution
        );

        Self {
            shape,
            velocity: FaceCenteredGrid::new(shape, Vector::<D>::zeros()),
            pressure_solver,
            boundary_solver,
            advection: SemiLagrangian::new(),
            free_surface: FreeSurface {
                height: simulation.fluid_height * shape.upper_corner()[1],
            },
            sphere: simulation.sphere,
        }
    }

    pub fn shape(&self) -> &GridShape<D> {
        &self.shape
    }

    pub fn velocity(&self) -> &FaceCenteredGrid<D> {
        &self.velocity
    }

    pub fn pressure(&self) -> &FdmVector<D> {
        self.pressure_solver.pressure()
    }

    pub fn boundary_solver(&self) -> &dyn BoundaryConditionSolver<D> {
        self.boundary_solver.as_ref()
    }

    /// Advances one time step. Returns the step residuals and the time
    /// spent in each phase.
    pub fn advance(&mut self, simulation: &Simulation<D>) -> (Residuals, Vec<(&'static str, Duration)>) {
        let dt = simulation.dt;
        let depth = simulation.extrapolation_depth;
        let previous = self.velocity.clone();

        let time = Instant::now();
        self.advection.advect_face_centered(
            &previous,
            &previous,
            dt,
            &mut self.velocity,
            self.boundary_solver.collider_sdf(),
        );
        let advection_duration = time.elapsed();

        let time = Instant::now();
        let gravity = dt * simulation.gravity;
        self.velocity
            .component_mut(1)
            .as_mut_slice()
            .par_iter_mut()
            .for_each(|value| *value += gravity);
        self.boundary_solver.constrain_velocity(&mut self.velocity, depth);
        let forces_duration = time.elapsed();

        let time = Instant::now();
        self.pressure_solver.solve(
            &mut self.velocity,
            self.boundary_solver.collider_sdf(),
            self.boundary_solver.collider_velocity_field(),
            &self.free_surface,
            simulation.use_compressed,
        );
        self.boundary_solver.constrain_velocity(&mut self.velocity, depth);
        let projection_duration = time.elapsed();

        let time = Instant::now();
        self.extrapolate_velocity_to_air();
        self.move_sphere(dt);
        let update_duration = time.elapsed();

        let stats = self.pressure_solver.linear_system_solver().stats();
        let residuals = Residuals {
            velocity_change: self.max_velocity_change(&previous),
            divergence: self.max_divergence(),
            pressure_residual: stats.last_residual,
            pressure_iterations: stats.last_number_of_iterations,
        };
        let elapsed_times = vec![
            ("advection", advection_duration),
            ("forces", forces_duration),
            ("projection", projection_duration),
            ("update", update_duration),
        ];
        (residuals, elapsed_times)
    }

    /// Fills the faces above the free surface from the fluid below.
    fn extrapolate_velocity_to_air(&mut self) {
        let depth = self.shape.resolution.iter().copied().max().unwrap_or(0);
        let free_surface = self.free_surface;
        for axis in 0..D {
            let origin = *self.velocity.component_origin(axis);
            let spacing = self.shape.spacing;
            let component = self.velocity.component_mut(axis);
            let mut valid = Array::new(component.size(), false);
            valid.par_for_each_index_mut(|index, valid| {
                let point = origin + spacing.component_mul(&to_vector(&index));
                *valid = is_inside_sdf(free_surface.sample(&point));
            });
            let input = component.clone();
            extrapolate_to_region(&input, &valid, depth, component);
        }
    }

    fn move_sphere(&mut self, dt: Float) {
        if let Some(sphere) = self.sphere.as_mut() {
            if sphere.linear_velocity.norm_squared() > 0.0 {
                sphere.center += dt * sphere.linear_velocity;
                let collider: Arc<dyn Collider<D>> = Arc::new(*sphere);
                self.boundary_solver.update_collider(Some(collider), &self.shape);
            }
        }
    }

    fn max_velocity_change(&self, previous: &FaceCenteredGrid<D>) -> Float {
        (0..D)
            .map(|axis| {
                self.velocity
                    .component(axis)
                    .as_slice()
                    .par_iter()
                    .zip(previous.component(axis).as_slice().par_iter())
                    .map(|(new, old)| (new - old).abs())
                    .reduce(|| 0.0, Float::max)
            })
            .fold(0.0, Float::max)
    }

    /// Largest divergence over the cells inside the fluid and outside the
    /// collider.
    pub fn max_divergence(&self) -> Float {
        let collider_sdf = self.boundary_solver.collider_sdf();
        let (shape, velocity, free_surface) = (&self.shape, &self.velocity, &self.free_surface);
        (0..shape.number_of_cells())
            .into_par_iter()
            .map(|l| {
                let index = unravel(&shape.resolution, l);
                let point = shape.cell_center(&index);
                let in_fluid = is_inside_sdf(ScalarField::<D>::sample(free_surface, &point));
                if in_fluid && !is_inside_sdf(collider_sdf.sample(&point)) {
                    velocity.divergence_at_cell_center(&index).abs()
                } else {
                    0.0
                }
            })
            .reduce(|| 0.0, Float::max)
    }
}

pub fn run<const D: usize>(benchmark: bool) -> anyhow::Result<()> {
    let setup_time = Instant::now();
    let mut simulation = Simulation::<D>::build_case_setup()?;
    let mut domain = FluidDomain::new(&simulation);
    let setup_duration = setup_time.elapsed();

    loop {
        let loop_time = Instant::now();
        let (residuals, mut elapsed_times) = domain.advance(&simulation);

        simulation.write_data(&domain)?;

        if simulation.stop_condition(&residuals) {
            simulation.write_data_from_steps(&domain)?;
            break;
        }

        simulation.print_residuals(&residuals);
        simulation
            .write_residuals(&residuals)
            .context("while writing the residuals file")?;

        if benchmark {
            elapsed_times.insert(0, ("setup", setup_duration));
            elapsed_times.push(("loop", loop_time.elapsed()));
            io::write_inside_loop_elapsed_time(&elapsed_times, simulation.time_step)
                .context("while writing the elapsed time file")?;
        }

        simulation.next_step();
    }

    println!(
        "\n{} {:.2} s.",
        "Total elapsed time:".cyan().bold(),
        simulation.simulation_time.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_parameters<const D: usize>() -> HashMap<String, String> {
        io::extract_parameters(&default_case_setup::<D>())
    }

    #[test]
    fn test_default_setup_parses() {
        let simulation = Simulation::<3>::from_setup(&default_parameters::<3>()).unwrap();
        assert_eq!(simulation.resolution, [32, 32, 32]);
        assert_eq!(simulation.solver_kind, SolverKind::MultigridPcg);
        assert_eq!(simulation.boundary_scheme, BoundaryScheme::Fractional);
        let sphere = simulation.sphere.unwrap();
        assert_eq!(sphere.center, Vector::<3>::new(0.5, 0.35, 0.5));
        assert_eq!(sphere.radius, 0.15);
        assert_eq!(simulation.write_data_mode, WriteDataMode::Frequency(100));
    }

    #[test]
    fn test_invalid_setups_are_rejected() {
        let mut parameters = default_parameters::<2>();
        parameters.remove("case_name");
        assert_eq!(
            Simulation::<2>::from_setup(&parameters).unwrap_err(),
            ParameterError::MissingKey("case_name".to_string())
        );

        let mut parameters = default_parameters::<2>();
        parameters.insert("resolution".to_string(), "16 0".to_string());
        assert_eq!(
            Simulation::<2>::from_setup(&parameters).unwrap_err(),
            ParameterError::InvalidResolution(vec![16, 0])
        );

        let mut parameters = default_parameters::<2>();
        parameters.insert("resolution".to_string(), "16 16 16".to_string());
        assert!(matches!(
            Simulation::<2>::from_setup(&parameters),
            Err(ParameterError::InvalidResolution(_))
        ));

        let mut parameters = default_parameters::<2>();
        parameters.insert("resolution".to_string(), "16 sixteen".to_string());
        assert_eq!(
            Simulation::<2>::from_setup(&parameters).unwrap_err(),
            ParameterError::InvalidValue {
                key: "resolution".to_string(),
                value: "16 sixteen".to_string(),
            }
        );

        let mut parameters = default_parameters::<2>();
        parameters.insert("solver".to_string(), "direct".to_string());
        assert!(matches!(
            Simulation::<2>::from_setup(&parameters),
            Err(ParameterError::UnknownSolver(_))
        ));

        let mut parameters = default_parameters::<2>();
        parameters.insert("mg_levels".to_string(), "0".to_string());
        assert_eq!(
            Simulation::<2>::from_setup(&parameters).unwrap_err(),
            ParameterError::ZeroLevels
        );
    }

    #[test]
    fn test_zero_radius_removes_the_sphere() {
        let mut parameters = default_parameters::<2>();
        parameters.insert("sphere_radius".to_string(), "0".to_string());
        parameters.remove("sphere_center");
        let simulation = Simulation::<2>::from_setup(&parameters).unwrap();
        assert!(simulation.sphere.is_none());
    }

    #[test]
    fn test_stop_condition() {
        let mut simulation = Simulation::<2>::from_setup(&default_parameters::<2>()).unwrap();
        simulation.min_iter = 2;
        simulation.max_iter = 5;
        let settled = Residuals::default();
        let moving = Residuals {
            velocity_change: 1.0,
            ..Residuals::default()
        };
        assert!(!simulation.stop_condition(&settled));
        simulation.time_step = 3;
        assert!(simulation.stop_condition(&settled));
        assert!(!simulation.stop_condition(&moving));
        simulation.time_step = 5;
        assert!(simulation.stop_condition(&moving));
    }

    #[test]
    fn test_free_surface_level_set() {
        let surface = FreeSurface { height: 0.25 };
        assert_eq!(ScalarField::<2>::sample(&surface, &Vector::<2>::new(3.0, 0.0)), -0.25);
        assert_eq!(
            ScalarField::<3>::gradient(&surface, &Vector::<3>::zeros()),
            Vector::<3>::new(0.0, 1.0, 0.0)
        );
    }
}
