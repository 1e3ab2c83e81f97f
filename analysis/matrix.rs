use crate::data::Record;
use crate::model::Predictor;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};

/// Name of the leading all-ones column.
pub const INTERCEPT: &str = "(intercept)";

/// Dense design matrix: an intercept column followed by one column per predictor,
/// in the order the predictors were given.
#[derive(Clone, Debug)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    column_names: Vec<String>,
}

impl DesignMatrix {
    pub fn build(records: &[Record], predictors: &[Predictor]) -> Self {
        let mut matrix = Array2::<f64>::zeros((records.len(), predictors.len() + 1));
        matrix.column_mut(0).fill(1.0);
        for (mut row, record) in matrix.rows_mut().into_iter().zip(records) {
            for (j, predictor) in predictors.iter().enumerate() {
                row[j + 1] = predictor.encode(record);
            }
        }

        let mut column_names = Vec::with_capacity(predictors.len() + 1);
        column_names.push(INTERCEPT.to_string());
        column_names.extend(predictors.iter().map(|p| p.term_name().to_string()));

        Self {
            matrix,
            column_names,
        }
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// Predictor columns only, without the intercept.
    pub fn predictor_columns(&self) -> ArrayView2<'_, f64> {
        self.matrix.slice(s![.., 1..])
    }

    pub fn matrix_vector_multiply(&self, vector: ArrayView1<f64>) -> Array1<f64> {
        self.matrix.dot(&vector)
    }

    pub fn transpose_vector_multiply(&self, vector: &Array1<f64>) -> Array1<f64> {
        self.matrix.t().dot(vector)
    }

    /// `XᵀWX` for a diagonal weight matrix `W = diag(weights)`.
    pub fn weighted_cross_product(&self, weights: &Array1<f64>) -> Array2<f64> {
        let weighted = &self.matrix * &weights.view().insert_axis(Axis(1));
        self.matrix.t().dot(&weighted)
    }
}

/// 0/1 outcome vector aligned with [`DesignMatrix::build`] rows.
pub fn response(records: &[Record]) -> Array1<f64> {
    records.iter().map(Record::outcome).collect()
}
