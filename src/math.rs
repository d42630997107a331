//! Conversions from the calibrated-camera convention (x right, y down, z
//! forward) to GL's (x right, y up, looking down -z).

use glam::{Mat4, Vec4};

/// Near plane distance of projections made by [`intrinsic_to_projection`].
pub const NEAR: f32 = 0.01;
/// Far plane distance of projections made by [`intrinsic_to_projection`].
pub const FAR: f32 = 100.0;

/// Negates the y and z axes.
pub const CV_TO_GL: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, -1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);

/// Focal lengths and principal point of a pinhole camera, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl CameraIntrinsics {
    pub fn projection(&self, width: f32, height: f32) -> Mat4 {
        intrinsic_to_projection(self.fx, self.fy, self.cx, self.cy, width, height)
    }
}

/// Builds a GL projection matrix that images points the same way the camera
/// described by the intrinsics does, for a `w`x`h` viewport.
pub fn intrinsic_to_projection(fx: f32, fy: f32, cx: f32, cy: f32, w: f32, h: f32) -> Mat4 {
    // Written out row by row, then transposed into glam's column-major order.
    #[rustfmt::skip]
    let rows = Mat4::from_cols_array(&[
        2.0 * fx / w, 0.0,          1.0 - (2.0 * cx) / w,         0.0,
        0.0,          2.0 * fy / h, -1.0 + (2.0 * cy) / h,        0.0,
        0.0,          0.0,          (-FAR - NEAR) / (FAR - NEAR), -2.0 * FAR * NEAR / (FAR - NEAR),
        0.0,          0.0,          -1.0,                         0.0,
    ]);
    rows.transpose()
}

/// Turns a camera pose (world-to-camera rigid transform) into a GL view
/// matrix.
pub fn extrinsic_to_view(pose: Mat4) -> Mat4 {
    CV_TO_GL * pose
}

/// Reads a pose stored row by row, as calibration tools write them.
pub fn extrinsic_from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4Swizzles};

    use super::*;

    #[test]
    fn projection_scales_by_focal_length() {
        let projection = intrinsic_to_projection(480.0, 480.0, 320.0, 240.0, 320.0, 240.0);
        assert_eq!(projection.col(0).x, 3.0);
        assert_eq!(projection.col(1).y, 4.0);
        // Principal point shift and perspective divide live in the third column.
        assert_eq!(projection.col(2).x, -1.0);
        assert_eq!(projection.col(2).y, 1.0);
        assert_eq!(projection.col(2).w, -1.0);
        assert_eq!(projection.col(3).w, 0.0);
    }

    #[test]
    fn centered_principal_point_projects_axis_to_center() {
        let intrinsics = CameraIntrinsics {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        };
        let projection = intrinsics.projection(640.0, 480.0);
        let clip = projection * Vec4::new(0.0, 0.0, -2.0, 1.0);
        let ndc = clip.xyz() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > -1.0 && ndc.z < 1.0);
    }

    #[test]
    fn near_and_far_map_to_clip_bounds() {
        let projection = intrinsic_to_projection(1.0, 1.0, 0.5, 0.5, 1.0, 1.0);
        let depth = |z: f32| {
            let clip = projection * Vec4::new(0.0, 0.0, -z, 1.0);
            clip.z / clip.w
        };
        assert!((depth(NEAR) + 1.0).abs() < 1e-4);
        assert!((depth(FAR) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn identity_pose_gives_basis_flip() {
        assert_eq!(extrinsic_to_view(Mat4::IDENTITY), CV_TO_GL);
    }

    #[test]
    fn point_in_front_of_camera_ends_up_at_negative_z() {
        let view = extrinsic_to_view(Mat4::IDENTITY);
        let eye = view.transform_point3(Vec3::new(0.5, 0.25, 3.0));
        assert_eq!(eye, Vec3::new(0.5, -0.25, -3.0));
    }

    #[test]
    fn rows_are_read_row_major() {
        let pose = extrinsic_from_rows([
            [1.0, 0.0, 0.0, 0.1],
            [0.0, 1.0, 0.0, 0.2],
            [0.0, 0.0, 1.0, 0.3],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(pose.w_axis, Vec4::new(0.1, 0.2, 0.3, 1.0));
    }
}
