use std::ops::Range;

use super::program::{Model, Var, VarType};
use crate::solver::SolverOutput;

pub trait AddVars {
    type Out;

    /// Create a variable for any type
    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>)
        -> Self::Out;

    /// Binary variables
    fn binary(&self, model: &mut Model, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Binary, &(0.0..1.0))
    }

    /// A continuous non-negative variable
    fn cont(&self, model: &mut Model, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Continuous, &(0.0..f64::INFINITY))
    }
}

impl AddVars for usize {
    type Out = Vec<Var>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> Self::Out {
        (0..*self)
            .map(|i| model.add_var(&format!("{}_{}", base_name, i), vtype, bounds))
            .collect()
    }
}

impl AddVars for (usize, usize) {
    type Out = Vec<<usize as AddVars>::Out>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> Self::Out {
        (0..self.0)
            .map(|i| {
                self.1
                    .vars(model, &format!("{}_{}", base_name, i), vtype, bounds)
            })
            .collect()
    }
}

impl AddVars for (usize, usize, usize) {
    type Out = Vec<<(usize, usize) as AddVars>::Out>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> Self::Out {
        (0..self.0)
            .map(|i| {
                (self.1, self.2).vars(model, &format!("{}_{}", base_name, i), vtype, bounds)
            })
            .collect()
    }
}

/// Trait that converts model variables to their values in a solver output
pub trait ConvertVars {
    type Out;

    /// `None` if the output carries no assignment
    fn convert(&self, output: &SolverOutput) -> Option<Self::Out>;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, output: &SolverOutput) -> Option<Self::Out> {
        self.iter().map(|e| e.convert(output)).collect()
    }
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert(&self, output: &SolverOutput) -> Option<Self::Out> {
        output.value(*self)
    }
}

/// Interprets a solver value of a binary variable
pub fn is_set(value: f64) -> bool {
    value > 0.5
}

/// Interprets a solver value of an integer variable
pub fn integral(value: f64) -> i64 {
    value.round() as i64
}
